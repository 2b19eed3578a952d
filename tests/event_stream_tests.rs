//! Event stream connection handling over a scripted transport

mod common;

use common::scripted::{ScriptedTransport, Session, Step};
use common::test_fixtures::*;
use deflux::error::DefluxError;
use deflux::events::{DecodedState, EventStream, StateDecoder, StreamState};
use deflux::sensors::Sensors;
use deflux::SensorDirectory;
use rstest::*;
use std::sync::Arc;

fn stream_over(sensors: Sensors, transport: &ScriptedTransport) -> EventStream {
    let directory = Arc::new(SensorDirectory::new(Arc::new(CountingFetcher::new(sensors))));
    EventStream::new(
        ScriptedTransport::address(),
        Arc::new(transport.clone()),
        StateDecoder::new(directory),
    )
}

#[rstest]
#[tokio::test]
async fn test_bad_frame_keeps_connection(sensors: Sensors) {
    let transport = ScriptedTransport::new(vec![Session::Accept(vec![
        Step::frame(UNKNOWN_FRAME),
        Step::frame(HUMIDITY_FRAME),
    ])]);
    let mut stream = stream_over(sensors, &transport);
    stream.connect().await.unwrap();

    let err = stream.read_next().await.unwrap_err();
    assert!(matches!(err, DefluxError::EventDropped { .. }));
    assert!(err.is_recoverable());
    assert_eq!(stream.state(), StreamState::Connected);

    let event = stream.read_next().await.unwrap();
    assert_eq!(event.sensor_id(), 2);
    assert!(matches!(event.state, DecodedState::Humidity(_)));
    assert_eq!(transport.dials(), 1);
}

#[rstest]
#[tokio::test]
async fn test_unresolvable_sensor_is_dropped_with_its_id(sensors: Sensors) {
    let frame = r#"{"t":"event","e":"changed","r":"sensors","id":"4","state":{"temperature":1}}"#;
    let transport = ScriptedTransport::new(vec![Session::Accept(vec![Step::frame(frame)])]);
    let mut stream = stream_over(sensors, &transport);
    stream.connect().await.unwrap();

    let err = stream.read_next().await.unwrap_err();

    assert_eq!(err.sensor_id(), Some(4));
    assert_eq!(err.kind(), "not_found");
    assert!(stream.is_connected());
}

#[rstest]
#[tokio::test]
async fn test_lost_connection_needs_redial(sensors: Sensors) {
    let transport = ScriptedTransport::new(vec![
        Session::Accept(vec![Step::frame(TEMPERATURE_FRAME), Step::Fail("reset by peer".into())]),
        Session::Accept(vec![Step::frame(PRESSURE_FRAME)]),
    ]);
    let mut stream = stream_over(sensors, &transport);
    stream.connect().await.unwrap();

    stream.read_next().await.unwrap();
    let err = stream.read_next().await.unwrap_err();
    assert!(matches!(err, DefluxError::ConnectionLost(_)));
    assert!(!err.is_recoverable());
    assert_eq!(stream.state(), StreamState::Disconnected);
    assert_eq!(transport.closes(), 1);

    let err = stream.read_next().await.unwrap_err();
    assert!(matches!(err, DefluxError::ConnectionLost(_)));

    stream.connect().await.unwrap();
    let event = stream.read_next().await.unwrap();
    assert_eq!(event.sensor_id(), 3);
    assert_eq!(transport.dials(), 2);
}

#[rstest]
#[tokio::test]
async fn test_refused_dial_is_dial_failed(sensors: Sensors) {
    let transport = ScriptedTransport::new(vec![Session::Refuse("connection refused".into())]);
    let mut stream = stream_over(sensors, &transport);

    let err = stream.connect().await.unwrap_err();

    match err {
        DefluxError::DialFailed { address, reason } => {
            assert_eq!(address, "ws://127.0.0.1:443/");
            assert_eq!(reason, "connection refused");
        }
        other => panic!("expected DialFailed, got {other:?}"),
    }
    assert!(!stream.is_connected());
}

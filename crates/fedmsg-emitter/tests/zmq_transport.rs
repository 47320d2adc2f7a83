//! ZeroMQ transport against a local SUB socket.

use std::time::Duration;

use fedmsg_emitter::{
    BuildContext, BuildOutcome, EmitError, Pipeline, PipelineConfig, PublishError,
};
use zeromq::{Socket, SocketRecv, SubSocket};

/// SUB socket bound to an ephemeral port, subscribed to every topic.
async fn subscriber() -> (SubSocket, String) {
    let mut socket = SubSocket::new();
    let endpoint = socket.bind("tcp://127.0.0.1:0").await.expect("bind");
    socket.subscribe("").await.expect("subscribe");
    (socket, endpoint.to_string())
}

#[tokio::test]
async fn test_zmq_delivers_topic_and_body_frames() {
    let (mut sub, endpoint) = subscriber().await;
    let pipeline = Pipeline::zmq(PipelineConfig::new(&endpoint, "dev")).expect("valid config");
    let build = BuildContext::new("foo » debug", 42, Some(BuildOutcome::Success));

    // PUB drops messages until the subscription reaches it, so retry with a
    // fresh connection per invocation until one lands.
    let mut received = None;
    for _ in 0..40 {
        assert!(pipeline.emit(&build).await);
        if let Ok(Ok(message)) = tokio::time::timeout(Duration::from_millis(250), sub.recv()).await {
            received = Some(message);
            break;
        }
    }

    let frames = received.expect("message delivered").into_vec();
    assert_eq!(frames.len(), 2);
    assert_eq!(&frames[0][..], b"org.fedoraproject.dev.jenkins.build.passed");

    let body: serde_json::Value = serde_json::from_slice(&frames[1]).expect("json");
    assert_eq!(body["msg"]["project"], "foo");
    assert_eq!(body["msg"]["configuration"], "debug");
    assert_eq!(body["msg"]["build"], 42);
}

#[tokio::test]
async fn test_unreachable_bus_fails_cleanly() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let mut config = PipelineConfig::new(&format!("tcp://{addr}"), "dev");
    config.connect_timeout_ms = 300;
    let pipeline = Pipeline::zmq(config).expect("valid config");

    let err = pipeline
        .run(&BuildContext::new("foo", 1, Some(BuildOutcome::Failure)))
        .await
        .unwrap_err();

    assert!(
        matches!(
            err,
            EmitError::Publish(PublishError::Connect { .. } | PublishError::ConnectTimeout { .. })
        ),
        "got {err:?}"
    );
}

#[tokio::test]
async fn test_invalid_endpoint_is_publish_error() {
    let pipeline =
        Pipeline::zmq(PipelineConfig::new("hub.example.org:9940", "dev")).expect("valid config");
    let err = pipeline
        .run(&BuildContext::new("foo", 1, Some(BuildOutcome::Success)))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        EmitError::Publish(PublishError::InvalidEndpoint(_))
    ));
}

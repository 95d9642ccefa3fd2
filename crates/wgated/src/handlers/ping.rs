//! Liveness probe.

use async_trait::async_trait;
use serde_json::Value;

use crate::dispatch::{Document, Job, JobContext, JobError};

pub(super) const ECHO_PARAM: &str = "echo";

/// Answers `{"pong": true}`, echoing the optional `echo` field.
#[derive(Debug, Default, Clone, Copy)]
pub struct PingJob;

#[async_trait]
impl Job for PingJob {
    async fn start(self: Box<Self>, context: JobContext) -> Result<Document, JobError> {
        let mut response = Document::new();
        response.insert("pong".to_owned(), Value::Bool(true));
        if let Some(echo) = context.declared_param(ECHO_PARAM) {
            response.insert(ECHO_PARAM.to_owned(), echo.clone());
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use rstest::rstest;
    use serde_json::{Value, json};

    use crate::dispatch::{Dispatcher, JsonCodec, Privilege};
    use crate::handlers::{PING_REQUEST, builtin_registry};
    use crate::tests::support::{RecordingSink, request};

    #[rstest]
    #[case::with_echo(json!({ "echo": "hello" }), json!({ "pong": true, "echo": "hello", "success": 1 }))]
    #[case::without_echo(Value::Null, json!({ "pong": true, "success": 1 }))]
    #[case::undeclared_fields_ignored(json!({ "other": 1 }), json!({ "pong": true, "success": 1 }))]
    #[tokio::test]
    async fn ping_answers_with_pong(#[case] body: Value, #[case] expected: Value) {
        let dispatcher = Dispatcher::new(
            Arc::new(builtin_registry()),
            Arc::new(JsonCodec),
            Duration::from_secs(1),
        );
        let sink = Arc::new(RecordingSink::default());
        dispatcher
            .dispatch(request(1, PING_REQUEST, Privilege::Session, body), sink.clone())
            .expect("ping accepted")
            .finished()
            .await
            .expect("completion task");

        assert_eq!(sink.payload(0), Some(expected));
        assert!(sink.responses()[0].success);
    }
}

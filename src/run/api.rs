//! Client for the workflow api.
//!
//! Only the three calls an editing session needs: load a workflow, save its
//! graph and run it. Any non-2xx response becomes [`FlowCanvasError::Api`]
//! carrying the server's `detail` message; a 204 is a successful no-op.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, trace};

use crate::{
    FlowCanvasError, Result,
    config::ApiConfig,
    model::{Workflow, WorkflowGraph},
    run::RunResult,
};

#[async_trait]
pub trait WorkflowApi: Send + Sync {
    /// `GET /workflows/{id}`
    async fn get_workflow(
        &self,
        id: &str,
    ) -> Result<Workflow>;

    /// `PUT /workflows/{id}` with `{graph}`. `None` when the server answered 204.
    async fn save_graph(
        &self,
        id: &str,
        graph: &WorkflowGraph,
    ) -> Result<Option<Workflow>>;

    /// `POST /workflows/{id}/run` with `{input_data}`.
    async fn run(
        &self,
        id: &str,
        input: &Value,
    ) -> Result<RunResult>;
}

#[derive(Serialize)]
struct SaveBody<'a> {
    graph: &'a WorkflowGraph,
}

#[derive(Serialize)]
struct RunBody<'a> {
    input_data: &'a Value,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    detail: Value,
}

/// [`WorkflowApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpWorkflowApi {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpWorkflowApi {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_millis(config.request_timeout_ms)).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    fn request(
        &self,
        method: Method,
        path: &str,
    ) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        trace!(%method, %url, "workflow api request");
        let request = self.client.request(method, url);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<Option<T>> {
        let response = request.send().await?;
        let status = response.status();
        debug!(status = status.as_u16(), url = %response.url(), "workflow api response");

        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FlowCanvasError::Api {
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }
        let body = response.bytes().await?;
        serde_json::from_slice::<T>(&body).map(Some).map_err(|e| FlowCanvasError::Convert(format!("invalid response body: {}", e)))
    }

    async fn send_expecting<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<T> {
        self.send(request).await?.ok_or_else(|| FlowCanvasError::Convert(format!("empty response for {}", what)))
    }
}

/// Picks the server supplied message out of an error body.
fn error_message(
    status: StatusCode,
    body: &str,
) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(ErrorEnvelope { detail: Value::String(s) }) => s,
        Ok(ErrorEnvelope { detail }) => detail.to_string(),
        Err(_) if !body.trim().is_empty() => body.trim().to_string(),
        Err(_) => status.canonical_reason().unwrap_or("request failed").to_string(),
    }
}

#[async_trait]
impl WorkflowApi for HttpWorkflowApi {
    async fn get_workflow(
        &self,
        id: &str,
    ) -> Result<Workflow> {
        self.send_expecting(self.request(Method::GET, &format!("/workflows/{}", id)), "workflow").await
    }

    async fn save_graph(
        &self,
        id: &str,
        graph: &WorkflowGraph,
    ) -> Result<Option<Workflow>> {
        self.send(self.request(Method::PUT, &format!("/workflows/{}", id)).json(&SaveBody { graph })).await
    }

    async fn run(
        &self,
        id: &str,
        input: &Value,
    ) -> Result<RunResult> {
        self.send_expecting(self.request(Method::POST, &format!("/workflows/{}/run", id)).json(&RunBody { input_data: input }), "run").await
    }
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, mock};
    use serde_json::json;

    use super::*;
    use crate::model::{AgentNode, AgentType};

    fn api(token: Option<&str>) -> HttpWorkflowApi {
        HttpWorkflowApi::new(&ApiConfig {
            base_url: format!("{}/", mockito::server_url()),
            token: token.map(str::to_string),
            request_timeout_ms: 5_000,
        })
        .unwrap()
    }

    fn block_on<F: std::future::Future>(f: F) -> F::Output {
        tokio::runtime::Runtime::new().expect("Unable to create a runtime").block_on(f)
    }

    #[test]
    fn test_get_workflow() {
        let get_mock = mock("GET", "/workflows/wf-get")
            .match_header("authorization", "Bearer t0k3n")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"wf-get","name":"Digest","graph":{"nodes":[{"id":"a","agent_type":"llm"}],"edges":[]}}"#)
            .create();

        let workflow = block_on(api(Some("t0k3n")).get_workflow("wf-get")).unwrap();
        get_mock.assert();
        assert_eq!(workflow.name, "Digest");
        assert_eq!(workflow.graph.nodes.len(), 1);
    }

    #[test]
    fn test_save_graph_sends_graph_body() {
        let graph = WorkflowGraph {
            nodes: vec![AgentNode::new("a", AgentType::CodeExec)],
            edges: vec![],
        };
        let save_mock = mock("PUT", "/workflows/wf-save")
            .match_body(Matcher::AllOf(vec![
                Matcher::PartialJson(json!({"graph": {"edges": []}})),
                Matcher::Regex(r#""agent_type":"code_exec""#.to_string()),
                Matcher::Regex(r#""stop_on_failure":true"#.to_string()),
            ]))
            .with_status(200)
            .with_body(r#"{"id":"wf-save","name":"Saved","graph":{"nodes":[{"id":"a","agent_type":"code_exec"}],"edges":[]}}"#)
            .create();

        let saved = block_on(api(None).save_graph("wf-save", &graph)).unwrap();
        save_mock.assert();
        assert_eq!(saved.unwrap().name, "Saved");
    }

    #[test]
    fn test_no_content_is_success() {
        let save_mock = mock("PUT", "/workflows/wf-204").with_status(204).create();
        let saved = block_on(api(None).save_graph("wf-204", &WorkflowGraph::default())).unwrap();
        save_mock.assert();
        assert!(saved.is_none());
    }

    #[test]
    fn test_error_detail_is_surfaced() {
        let run_mock = mock("POST", "/workflows/wf-limit/run")
            .match_body(Matcher::Json(json!({"input_data": {"topic": "rust"}})))
            .with_status(429)
            .with_body(r#"{"detail":"Monthly run limit reached"}"#)
            .create();

        let err = block_on(api(None).run("wf-limit", &json!({"topic": "rust"}))).unwrap_err();
        run_mock.assert();
        assert_eq!(
            err,
            FlowCanvasError::Api {
                status: 429,
                message: "Monthly run limit reached".to_string()
            }
        );
    }

    #[test]
    fn test_error_without_envelope() {
        let get_mock = mock("GET", "/workflows/wf-missing").with_status(404).create();
        let err = block_on(api(None).get_workflow("wf-missing")).unwrap_err();
        get_mock.assert();
        assert!(err.to_string().contains("Not Found"));
    }

    #[test]
    fn test_run_result() {
        let run_mock = mock("POST", "/workflows/wf-run/run")
            .with_status(200)
            .with_body(r#"{"status":"completed","node_results":{"a":{"status":"failed","duration_ms":120}},"total_tokens":0,"total_cost_usd":0.0,"duration_ms":130}"#)
            .create();
        let result = block_on(api(None).run("wf-run", &json!({}))).unwrap();
        run_mock.assert();
        assert_eq!(result.node_results["a"].duration_ms, 120);
    }

    #[test]
    fn test_error_message_shapes() {
        assert_eq!(error_message(StatusCode::BAD_REQUEST, r#"{"detail":[{"msg":"bad"}]}"#), r#"[{"msg":"bad"}]"#);
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, "upstream down"), "upstream down");
        assert_eq!(error_message(StatusCode::INTERNAL_SERVER_ERROR, ""), "Internal Server Error");
    }
}

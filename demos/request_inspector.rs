use std::sync::Arc;
use threadweb::{Handler, HandlerFactory, HttpError, Request, Response, Server};

struct RequestInspector;

impl Handler for RequestInspector {
    fn methods(&self) -> &[&str] {
        &["GET", "POST"]
    }

    fn call(&self, method: &str, request: &Request) -> Result<Response, HttpError> {
        let user_agent = request
            .headers()
            .get("user-agent")
            .map(|v| format!(r#", "user_agent": {v:?}"#))
            .unwrap_or_default();

        let content_type = request
            .headers()
            .get("content-type")
            .map(|v| format!(r#", "content_type": {v:?}"#))
            .unwrap_or_default();

        let body = String::from_utf8_lossy(request.body().unwrap_or(&[])).into_owned();

        let result = format!(
            r#"{{"method": "{method}", "resource": {:?}{user_agent}{content_type}, "body": {body:?}}}"#,
            request.resource(),
        );

        Ok(Response::new(200)
            .header("Content-Type", "application/json")
            .body(result))
    }
}

fn main() -> std::io::Result<()> {
    env_logger::init();

    let factory: HandlerFactory = Arc::new(|| Arc::new(RequestInspector));

    let mut server = Server::builder()
        .bind("127.0.0.1:8080")?
        .route("/.*", factory)
        .unwrap()
        .build();

    server.start();
    server.join(None);
    Ok(())
}

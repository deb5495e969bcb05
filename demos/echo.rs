use std::sync::Arc;
use threadweb::{Handler, HandlerFactory, HttpError, Request, Response, Server};

struct Echo;

impl Handler for Echo {
    fn methods(&self) -> &[&str] {
        &["GET", "POST"]
    }

    fn call(&self, _method: &str, request: &Request) -> Result<Response, HttpError> {
        let body = String::from_utf8_lossy(request.body().unwrap_or(&[])).into_owned();
        let result = format!(
            r#"{{"resource": {:?}, "body": {:?}}}"#,
            request.resource(),
            body,
        );

        Ok(Response::new(200)
            .header("Content-Type", "application/json")
            .body(result))
    }
}

fn main() -> std::io::Result<()> {
    env_logger::init();

    let factory: HandlerFactory = Arc::new(|| Arc::new(Echo));

    let mut server = Server::builder()
        .bind("127.0.0.1:8080")?
        .route("/.*", factory)
        .unwrap()
        .build();

    server.start();
    server.join(None);
    Ok(())
}

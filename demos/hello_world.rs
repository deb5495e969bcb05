use std::sync::Arc;
use threadweb::{Handler, HandlerFactory, HttpError, Request, Response, Server};

struct HelloWorld;

impl Handler for HelloWorld {
    fn methods(&self) -> &[&str] {
        &["GET"]
    }

    fn call(&self, _method: &str, _request: &Request) -> Result<Response, HttpError> {
        Ok(Response::new(200)
            .header("Content-Type", "text/plain")
            .body("Hello, world!\n"))
    }
}

fn main() -> std::io::Result<()> {
    env_logger::init();

    let factory: HandlerFactory = Arc::new(|| Arc::new(HelloWorld));

    let mut server = Server::builder()
        .bind("127.0.0.1:8080")?
        .route("/", factory)
        .unwrap()
        .build();

    server.start();
    server.join(None);
    Ok(())
}

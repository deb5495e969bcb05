use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use threadweb::{Handler, HandlerFactory, HttpError, Request, Response, Server};

struct RequestCounter {
    count: Arc<AtomicUsize>,
}

impl Handler for RequestCounter {
    fn methods(&self) -> &[&str] {
        &["GET"]
    }

    fn call(&self, _method: &str, _request: &Request) -> Result<Response, HttpError> {
        let count = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Response::new(200)
            .header("Content-Type", "application/json")
            .body(format!(r#"{{"count_request": {count}}}"#)))
    }
}

fn main() -> std::io::Result<()> {
    env_logger::init();

    let count = Arc::new(AtomicUsize::new(0));
    let factory: HandlerFactory = Arc::new(move || {
        Arc::new(RequestCounter {
            count: count.clone(),
        })
    });

    let mut server = Server::builder()
        .bind("127.0.0.1:8080")?
        .route("/", factory)
        .unwrap()
        .build();

    server.start();
    server.join(None);
    Ok(())
}

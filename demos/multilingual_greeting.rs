use std::sync::Arc;
use threadweb::{Handler, HandlerFactory, HttpError, Request, Response, Server};

struct Greeting;

impl Handler for Greeting {
    fn methods(&self) -> &[&str] {
        &["GET"]
    }

    fn call(&self, _method: &str, request: &Request) -> Result<Response, HttpError> {
        let text = match request.param("lang") {
            Some("en") => r#"{"lang": "en", "text": "Hello, world!"}"#,
            Some("zh") => r#"{"lang": "zh", "text": "你好世界！"}"#,
            Some("es") => r#"{"lang": "es", "text": "¡Hola Mundo!"}"#,
            Some("ar") => r#"{"lang": "ar", "text": "مرحبا بالعالم!"}"#,
            Some("pt") => r#"{"lang": "pt", "text": "Olá, mundo!"}"#,
            Some("hi") => r#"{"lang": "hi", "text": "हैलो वर्ल्ड!"}"#,
            Some("ru") => r#"{"lang": "ru", "text": "Привет, мир!"}"#,
            Some(_) => {
                return Ok(Response::new(404)
                    .header("Content-Type", "application/json")
                    .body(r#"{"error": "Language not supported", "status": "Not Found"}"#))
            }
            None => unreachable!("route only matches when :lang is captured"),
        };

        Ok(Response::new(200)
            .header("Content-Type", "application/json")
            .body(text))
    }
}

struct SupportedLanguages;

impl Handler for SupportedLanguages {
    fn methods(&self) -> &[&str] {
        &["GET"]
    }

    fn call(&self, _method: &str, _request: &Request) -> Result<Response, HttpError> {
        Ok(Response::new(200)
            .header("Content-Type", "application/json")
            .body(r#"{"supported_lang": ["en", "zh", "es", "ar", "pt", "hi", "ru"]}"#))
    }
}

fn main() -> std::io::Result<()> {
    env_logger::init();

    let greeting: HandlerFactory = Arc::new(|| Arc::new(Greeting));
    let supported: HandlerFactory = Arc::new(|| Arc::new(SupportedLanguages));

    let mut server = Server::builder()
        .bind("127.0.0.1:8080")?
        .route(r"/api/(?P<lang>[^/]+)", greeting)
        .unwrap()
        .route("/api", supported)
        .unwrap()
        .build();

    server.start();
    server.join(None);
    Ok(())
}

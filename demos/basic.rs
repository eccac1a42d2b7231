//! Minimal melanth example — handlers, a controller, groups, middleware.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/greet/World
//!   curl -X POST http://localhost:3000/echo \
//!        -H 'content-type: application/json' \
//!        -d '{"foo":"bar"}'
//!   curl http://localhost:3000/api/users/42

use std::sync::Arc;

use melanth::middleware::Trace;
use melanth::{
    ActionContext, ActionFuture, Application, Construct, Container, Controller, Error, Method,
    Overrides, Pipe, Request, Response, RouteAction, Server, register_controller,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let mut app = Application::new();

    register_controller::<UserController>(app.container(), "user_controller");

    app.routes(|router| {
        router.middleware(Pipe::new(Trace));

        router.get("/greet/{name}", greet);
        router.post("/echo", echo);

        router.prefix("api").group(|r| {
            r.action(
                Method::GET,
                "users/{id}",
                RouteAction::controller("user_controller@show"),
            );
        });
    });

    Server::bind("0.0.0.0:3000")
        .serve(app)
        .await
        .expect("server error");
}

// GET /greet/{name}
//
// Path parameters are bound onto the request before the handler runs.
async fn greet(req: Request) -> Response {
    let name = req.param("name").unwrap_or("stranger");
    Response::text(format!("Hello, {name}"))
}

// POST /echo
//
// req.body() is &[u8]; req.json::<T>() deserializes it with serde_json.
async fn echo(req: Request) -> Response {
    match req.json::<serde_json::Value>() {
        Ok(value) => Response::json(serde_json::to_vec(&value).unwrap_or_default()),
        Err(_) => Response::status(melanth::StatusCode::BAD_REQUEST),
    }
}

// GET /api/users/{id} → "user_controller@show"
//
// Controllers are resolved out of the container on every dispatch.
struct UserController;

impl Construct for UserController {
    fn construct(_: &Container, _: &Overrides) -> Result<Self, Error> {
        Ok(UserController)
    }
}

impl Controller for UserController {
    fn call(self: Arc<Self>, method: &str, ctx: ActionContext) -> ActionFuture {
        match method {
            "show" => Box::pin(async move {
                let id = ctx.value::<u64>("id")?;
                Ok(Response::json(format!(r#"{{"id":{id},"name":"alice"}}"#).into_bytes()))
            }),
            other => {
                let other = other.to_owned();
                Box::pin(async move { Err(Error::InvalidAction(other)) })
            }
        }
    }
}

//! Full-stack tests: requests travel through the application boundary,
//! middleware pipeline, router, and dispatcher.

use std::sync::{Arc, Mutex};

use melanth::{
    ActionContext, ActionFuture, Application, Construct, Container, Controller, Error,
    IntoResponse, Json, Method, Next, Overrides, Pipe, Request, Response, RouteAction,
    StatusCode, register_controller, register_middleware,
};
use serde::Deserialize;

async fn greet(req: Request) -> Response {
    let name = req.param("name").unwrap_or("stranger");
    Response::text(format!("Hello, {name}"))
}

#[tokio::test]
async fn path_parameters_reach_handlers() {
    let mut app = Application::new();
    app.routes(|router| {
        router.get("/greet/{name}", greet);
    });
    app.boot().unwrap();

    let response = app.handle(Request::new(Method::GET, "/greet/World")).await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.body(), b"Hello, World");
}

#[tokio::test]
async fn encoded_path_segments_are_decoded_before_matching() {
    let mut app = Application::new();
    app.routes(|router| {
        router.get("/greet/{name}", greet);
    });
    app.boot().unwrap();

    let response = app.handle(Request::new(Method::GET, "/greet/Ada%20Lovelace")).await;

    assert_eq!(response.body(), b"Hello, Ada Lovelace");
}

#[derive(Deserialize, serde::Serialize)]
struct EchoBody {
    foo: String,
}

#[tokio::test]
async fn json_bodies_round_through_handlers() {
    async fn echo(req: Request) -> Response {
        match req.json::<EchoBody>() {
            Ok(body) => Json(body).into_response(),
            Err(_) => Response::status(StatusCode::BAD_REQUEST),
        }
    }

    let mut app = Application::new();
    app.routes(|router| {
        router.post("/echo", echo);
    });
    app.boot().unwrap();

    let request = Request::new(Method::POST, "/echo")
        .with_header("content-type", "application/json")
        .with_body(br#"{"foo":"bar"}"#.to_vec());
    let response = app.handle(request).await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.header("content-type"), Some("application/json"));

    let echoed: EchoBody = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(echoed.foo, "bar");
}

#[tokio::test]
async fn unmatched_paths_render_not_found() {
    let mut app = Application::new();
    app.routes(|router| {
        router.get("/greet/{name}", greet);
    });
    app.boot().unwrap();

    let response = app.handle(Request::new(Method::DELETE, "/greet/World")).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

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
                Ok(Response::json(format!(r#"{{"id":{id}}}"#).into_bytes()))
            }),
            other => {
                let other = other.to_owned();
                Box::pin(async move { Err(Error::InvalidAction(other)) })
            }
        }
    }
}

#[tokio::test]
async fn controller_actions_resolve_through_the_container() {
    let mut app = Application::new();
    register_controller::<UserController>(app.container(), "user_controller");
    app.routes(|router| {
        router.prefix("api").group(|r| {
            r.action(
                Method::GET,
                "users/{id}",
                RouteAction::controller("user_controller@show"),
            );
        });
    });
    app.boot().unwrap();

    let response = app.handle(Request::new(Method::GET, "/api/users/42")).await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.body(), br#"{"id":42}"#);
}

struct RequireHeader;

impl melanth::Middleware for RequireHeader {
    fn handle(&self, request: Request, next: Next, args: Vec<String>) -> melanth::MiddlewareFuture {
        Box::pin(async move {
            let name = args.first().map(String::as_str).unwrap_or("x-required");
            if request.header(name).is_none() {
                return Ok(Response::status(StatusCode::UNAUTHORIZED));
            }
            next.run(request).await
        })
    }
}

#[tokio::test]
async fn container_resolved_middleware_guards_grouped_routes() {
    let mut app = Application::new();
    register_middleware(app.container(), "require", RequireHeader);
    app.routes(|router| {
        router.prefix("admin").middleware(Pipe::service("require:x-token")).group(|r| {
            r.get("users", |_req: Request| async { Response::text("admins only") });
        });
        router.get("/public", |_req: Request| async { Response::text("public") });
    });
    app.boot().unwrap();

    let denied = app.handle(Request::new(Method::GET, "/admin/users")).await;
    assert_eq!(denied.status_code(), StatusCode::UNAUTHORIZED);

    let allowed = app
        .handle(Request::new(Method::GET, "/admin/users").with_header("x-token", "secret"))
        .await;
    assert_eq!(allowed.status_code(), StatusCode::OK);
    assert_eq!(allowed.body(), b"admins only");

    // Routes outside the group skip the guard entirely.
    let public = app.handle(Request::new(Method::GET, "/public")).await;
    assert_eq!(public.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn global_middleware_runs_before_route_middleware() {
    let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    let tag = |label: &'static str, log: &Arc<Mutex<Vec<&'static str>>>| {
        let log = Arc::clone(log);
        Pipe::new(move |req: Request, next: Next| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push(label);
                next.run(req).await
            }
        })
    };

    let mut app = Application::new();
    let global = tag("global", &order);
    let grouped = tag("grouped", &order);
    app.routes(move |router| {
        router.middleware(global);
        router.prefix("v1").middleware(grouped).group(|r| {
            r.get("ping", |_req: Request| async { Response::text("pong") });
        });
    });
    app.boot().unwrap();

    app.handle(Request::new(Method::GET, "/v1/ping")).await;

    assert_eq!(*order.lock().unwrap(), vec!["global", "grouped"]);
}

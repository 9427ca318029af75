use std::sync::Arc;

use actix_web::{App, test, web};
use gpio_api::{AppState, GpioController, SimulationDriver, ValidPinSet, api_scope};
use serde_json::{Value, json};

fn app_state() -> AppState {
    let controller = GpioController::new(
        ValidPinSet::default(),
        Box::new(SimulationDriver::default()),
    );
    AppState {
        controller: Arc::new(controller),
    }
}

macro_rules! init_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state))
                .service(api_scope("/api")),
        )
        .await
    };
}

#[actix_rt::test]
async fn health_reports_version() {
    let app = init_app!(app_state());

    let req = test::TestRequest::get().uri("/api/health").to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(resp["status"], "ok");
    assert_eq!(resp["version"], env!("CARGO_PKG_VERSION"));
    assert!(resp["message"].is_string());
}

#[actix_rt::test]
async fn setup_on_off_status_happy_path() {
    let app = init_app!(app_state());

    let req = test::TestRequest::post()
        .uri("/api/pins/setup")
        .set_json(json!({ "pins": [18, 19] }))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["status"], "success");
    assert_eq!(resp["results"][0]["pin"], 18);
    assert_eq!(resp["results"][0]["result"], "configured");

    let req = test::TestRequest::post().uri("/api/pin/18/on").to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["status"], "success");
    assert_eq!(resp["pin"], 18);
    assert_eq!(resp["state"], "HIGH");

    let req = test::TestRequest::get()
        .uri("/api/pin/18/status")
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp, json!({ "pin": 18, "state": "HIGH" }));

    let req = test::TestRequest::get().uri("/api/pins/status").to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["pins"], json!({ "18": "HIGH", "19": "LOW" }));

    let req = test::TestRequest::post().uri("/api/pin/18/off").to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["state"], "LOW");
}

#[actix_rt::test]
async fn setup_reports_rejected_pins_without_failing() {
    let app = init_app!(app_state());

    let req = test::TestRequest::post()
        .uri("/api/pins/setup")
        .set_json(json!({ "pins": [18, 999] }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["results"][0]["result"], "configured");
    assert_eq!(body["results"][1]["pin"], 999);
    assert_eq!(body["results"][1]["result"], "rejected");
    assert!(body["results"][1]["reason"].is_string());
}

#[actix_rt::test]
async fn setup_rejects_negative_pins_individually() {
    let app = init_app!(app_state());

    let req = test::TestRequest::post()
        .uri("/api/pins/setup")
        .set_json(json!({ "pins": [18, -1] }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["results"][0]["pin"], 18);
    assert_eq!(body["results"][0]["result"], "configured");
    assert_eq!(body["results"][1]["pin"], -1);
    assert_eq!(body["results"][1]["result"], "rejected");

    let req = test::TestRequest::get()
        .uri("/api/pin/18/status")
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["state"], "LOW");
}

#[actix_rt::test]
async fn setup_rejects_malformed_body() {
    let app = init_app!(app_state());

    let req = test::TestRequest::post().uri("/api/pins/setup").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let req = test::TestRequest::post()
        .uri("/api/pins/setup")
        .set_payload(r#"{"pins": "18"}"#)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_rt::test]
async fn invalid_pin_returns_400() {
    let app = init_app!(app_state());

    let req = test::TestRequest::post().uri("/api/pin/1/on").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "error");
    assert_eq!(body["pin"], 1);

    let req = test::TestRequest::post().uri("/api/pin/-1/on").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["pin"], -1);
    assert!(body["message"].as_str().unwrap().contains("-1"));

    let req = test::TestRequest::get()
        .uri("/api/pin/abc/status")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_rt::test]
async fn unconfigured_pin_returns_409_with_unknown_state() {
    let app = init_app!(app_state());

    let req = test::TestRequest::get()
        .uri("/api/pin/17/status")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 409);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["pin"], 17);
    assert_eq!(body["state"], "UNKNOWN");

    let req = test::TestRequest::post().uri("/api/pin/17/on").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 409);
}

#[actix_rt::test]
async fn cleanup_unconfigures_pins() {
    let app = init_app!(app_state());

    let req = test::TestRequest::post()
        .uri("/api/pins/setup")
        .set_json(json!({ "pins": [4] }))
        .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::post().uri("/api/pins/cleanup").to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["status"], "success");

    let req = test::TestRequest::get().uri("/api/pin/4/status").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 409);

    let req = test::TestRequest::get().uri("/api/pins/status").to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["pins"], json!({}));
}

#[actix_rt::test]
async fn toggle_pulse_and_blink() {
    let app = init_app!(app_state());

    let req = test::TestRequest::post()
        .uri("/api/pins/setup")
        .set_json(json!({ "pins": [21] }))
        .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::post()
        .uri("/api/pin/21/toggle")
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["state"], "HIGH");

    let req = test::TestRequest::post()
        .uri("/api/pin/21/pulse")
        .set_json(json!({ "duration_ms": 5 }))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["state"], "LOW");

    let req = test::TestRequest::post()
        .uri("/api/pin/21/blink")
        .set_json(json!({ "times": 2, "interval_ms": 1 }))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["state"], "LOW");

    let req = test::TestRequest::post()
        .uri("/api/pin/21/blink")
        .set_json(json!({ "times": 0 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let req = test::TestRequest::post()
        .uri("/api/pin/21/pulse")
        .set_json(json!({ "duration_ms": 60_000 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_rt::test]
async fn blink_total_time_is_capped() {
    let app = init_app!(app_state());

    let req = test::TestRequest::post()
        .uri("/api/pins/setup")
        .set_json(json!({ "pins": [20] }))
        .to_request();
    test::call_service(&app, req).await;

    // each parameter is in range on its own
    let req = test::TestRequest::post()
        .uri("/api/pin/20/blink")
        .set_json(json!({ "times": 100, "interval_ms": 10_000 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let body: Value = test::read_body_json(resp).await;
    assert!(body["message"].as_str().unwrap().contains("limit"));

    let req = test::TestRequest::get()
        .uri("/api/pin/20/status")
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["state"], "LOW");
}

#[actix_rt::test]
async fn all_off_and_info() {
    let app = init_app!(app_state());

    let req = test::TestRequest::post()
        .uri("/api/pins/setup")
        .set_json(json!({ "pins": [5, 6] }))
        .to_request();
    test::call_service(&app, req).await;
    let req = test::TestRequest::post().uri("/api/pin/5/on").to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::post().uri("/api/pins/off").to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["pins"], json!({ "5": "LOW", "6": "LOW" }));

    let req = test::TestRequest::get().uri("/api/pins/info").to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["driver"], "simulation");
    assert_eq!(resp["configured_pins"], json!([5, 6]));
    assert_eq!(resp["total_configured"], 2);
    assert_eq!(resp["pins"]["7"], "UNKNOWN");
    assert_eq!(resp["in_sync"], true);
}

#[actix_rt::test]
async fn wrong_method_returns_405() {
    let app = init_app!(app_state());

    let req = test::TestRequest::get().uri("/api/pin/18/on").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 405);

    let req = test::TestRequest::post().uri("/api/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 405);
}

#[actix_rt::test]
async fn unknown_route_returns_json_404() {
    let app = init_app!(app_state());

    let req = test::TestRequest::get().uri("/api/gpio/18").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Endpoint not found");
}

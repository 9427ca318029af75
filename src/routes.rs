use log::info;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{HttpRequest, HttpResponse, Responder, guard, http::Method, web};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::AppError;
use crate::gpio::{GpioController, PinLevel, PinSetupResult};

const DEFAULT_PULSE_MS: u64 = 500;
const DEFAULT_BLINK_TIMES: u32 = 5;
const DEFAULT_BLINK_INTERVAL_MS: u64 = 500;
const MAX_BLINK_TIMES: u32 = 100;
const MAX_DURATION_MS: u64 = 10_000;
// on and off phases of every blink, summed
const MAX_BLINK_TOTAL_MS: u64 = 30_000;

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<GpioController>,
}

#[derive(Deserialize)]
struct SetupPayload {
    pins: Vec<i64>,
}

#[derive(Deserialize, Default)]
struct PulsePayload {
    duration_ms: Option<u64>,
}

#[derive(Deserialize, Default)]
struct BlinkPayload {
    times: Option<u32>,
    interval_ms: Option<u64>,
}

#[derive(Serialize)]
struct PinActionResponse {
    status: &'static str,
    message: String,
    pin: i64,
    state: PinLevel,
}

impl PinActionResponse {
    fn new(pin: i64, state: PinLevel, message: String) -> Self {
        Self {
            status: "success",
            message,
            pin,
            state,
        }
    }
}

#[derive(Serialize)]
struct PinStatusResponse {
    pin: i64,
    state: PinLevel,
}

#[derive(Serialize)]
struct PinsResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    pins: BTreeMap<u32, PinLevel>,
}

#[derive(Serialize)]
struct SetupResponse {
    status: &'static str,
    message: String,
    results: Vec<PinSetupResult>,
}

pub fn api_scope(base_path: &str) -> actix_web::Scope {
    web::scope(base_path)
        .service(
            web::resource("/health")
                .route(web::get().to(health))
                .route(
                    web::route()
                        .guard(guard_not_methods(&[Method::GET]))
                        .to(method_not_allowed),
                ),
        )
        .service(post_resource("/pin/{pin_id}/on", web::post().to(turn_on)))
        .service(post_resource("/pin/{pin_id}/off", web::post().to(turn_off)))
        .service(post_resource("/pin/{pin_id}/toggle", web::post().to(toggle)))
        .service(post_resource("/pin/{pin_id}/pulse", web::post().to(pulse)))
        .service(post_resource("/pin/{pin_id}/blink", web::post().to(blink)))
        .service(
            web::resource("/pin/{pin_id}/status")
                .route(web::get().to(pin_status))
                .route(
                    web::route()
                        .guard(guard_not_methods(&[Method::GET]))
                        .to(method_not_allowed),
                ),
        )
        .service(
            web::resource("/pins/status")
                .route(web::get().to(pins_status))
                .route(
                    web::route()
                        .guard(guard_not_methods(&[Method::GET]))
                        .to(method_not_allowed),
                ),
        )
        .service(
            web::resource("/pins/info")
                .route(web::get().to(pins_info))
                .route(
                    web::route()
                        .guard(guard_not_methods(&[Method::GET]))
                        .to(method_not_allowed),
                ),
        )
        .service(post_resource("/pins/setup", web::post().to(setup_pins)))
        .service(post_resource("/pins/off", web::post().to(all_off)))
        .service(post_resource("/pins/cleanup", web::post().to(cleanup)))
        .default_service(web::to(not_found))
}

fn post_resource(path: &str, route: actix_web::Route) -> actix_web::Resource {
    web::resource(path).route(route).route(
        web::route()
            .guard(guard_not_methods(&[Method::POST]))
            .to(method_not_allowed),
    )
}

async fn health() -> impl Responder {
    web::Json(json!({
        "status": "ok",
        "message": "Raspberry Pi GPIO API is running",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn turn_on(req: HttpRequest, state: web::Data<AppState>) -> Result<impl Responder, AppError> {
    let pin = parse_pin_id(&req)?;
    let level = state.controller.turn_on(pin)?;
    info!("Pin {pin} turned ON");

    Ok(web::Json(PinActionResponse::new(
        pin,
        level,
        format!("Pin {pin} turned ON"),
    )))
}

async fn turn_off(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<impl Responder, AppError> {
    let pin = parse_pin_id(&req)?;
    let level = state.controller.turn_off(pin)?;
    info!("Pin {pin} turned OFF");

    Ok(web::Json(PinActionResponse::new(
        pin,
        level,
        format!("Pin {pin} turned OFF"),
    )))
}

async fn toggle(req: HttpRequest, state: web::Data<AppState>) -> Result<impl Responder, AppError> {
    let pin = parse_pin_id(&req)?;
    let level = state.controller.toggle(pin)?;

    Ok(web::Json(PinActionResponse::new(
        pin,
        level,
        format!("Pin {pin} toggled to {level:?}"),
    )))
}

async fn pulse(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<impl Responder, AppError> {
    let pin = parse_pin_id(&req)?;
    let payload: PulsePayload = parse_optional_payload(&body)?;
    let duration = bounded_millis(
        "duration_ms",
        payload.duration_ms.unwrap_or(DEFAULT_PULSE_MS),
    )?;

    let level = state.controller.pulse(pin, duration).await?;

    Ok(web::Json(PinActionResponse::new(
        pin,
        level,
        format!("Pin {pin} pulsed for {}ms", duration.as_millis()),
    )))
}

async fn blink(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<impl Responder, AppError> {
    let pin = parse_pin_id(&req)?;
    let payload: BlinkPayload = parse_optional_payload(&body)?;
    let times = payload.times.unwrap_or(DEFAULT_BLINK_TIMES);
    if times == 0 || times > MAX_BLINK_TIMES {
        return Err(AppError::InvalidValue(format!(
            "times must be between 1 and {MAX_BLINK_TIMES}"
        )));
    }
    let interval_ms = payload.interval_ms.unwrap_or(DEFAULT_BLINK_INTERVAL_MS);
    let interval = bounded_millis("interval_ms", interval_ms)?;
    let total_ms = 2 * u64::from(times) * interval_ms;
    if total_ms > MAX_BLINK_TOTAL_MS {
        return Err(AppError::InvalidValue(format!(
            "blink would run {total_ms}ms, limit is {MAX_BLINK_TOTAL_MS}ms"
        )));
    }

    let level = state.controller.blink(pin, times, interval).await?;

    Ok(web::Json(PinActionResponse::new(
        pin,
        level,
        format!("Pin {pin} blinked {times} times"),
    )))
}

async fn pin_status(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<impl Responder, AppError> {
    let pin = parse_pin_id(&req)?;
    let level = state.controller.status(pin)?;

    Ok(web::Json(PinStatusResponse { pin, state: level }))
}

async fn pins_status(state: web::Data<AppState>) -> impl Responder {
    web::Json(PinsResponse {
        status: "success",
        message: None,
        pins: state.controller.status_all(),
    })
}

async fn pins_info(state: web::Data<AppState>) -> impl Responder {
    web::Json(state.controller.info())
}

async fn setup_pins(
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<impl Responder, AppError> {
    let payload = parse_setup_payload(&body)?;
    let results = state.controller.setup_pins(&payload.pins);
    let configured = results.iter().filter(|r| r.is_configured()).count();

    Ok(web::Json(SetupResponse {
        status: "success",
        message: format!("{configured} of {} pins configured", results.len()),
        results,
    }))
}

async fn all_off(state: web::Data<AppState>) -> Result<impl Responder, AppError> {
    let pins = state.controller.turn_all_off()?;

    Ok(web::Json(PinsResponse {
        status: "success",
        message: Some("All configured pins turned OFF".into()),
        pins,
    }))
}

async fn cleanup(state: web::Data<AppState>) -> Result<impl Responder, AppError> {
    state.controller.cleanup()?;

    Ok(web::Json(json!({
        "status": "success",
        "message": "GPIO cleanup completed",
    })))
}

/// Any integer is accepted here; range checks belong to the controller.
fn parse_pin_id(req: &HttpRequest) -> Result<i64, AppError> {
    let pin_id = req
        .match_info()
        .get("pin_id")
        .ok_or_else(|| AppError::InvalidValue("Missing pin id".into()))?;
    let pin_id = pin_id
        .parse::<i64>()
        .map_err(|_| AppError::InvalidValue("Invalid pin id".into()))?;

    Ok(pin_id)
}

fn parse_setup_payload(body: &[u8]) -> Result<SetupPayload, AppError> {
    if body.is_empty() {
        return Err(AppError::InvalidValue(
            "Missing pins configuration in request body".into(),
        ));
    }

    serde_json::from_slice(body)
        .map_err(|e| AppError::InvalidValue(format!("Invalid setup payload: {e}")))
}

/// Empty bodies fall back to the payload defaults.
fn parse_optional_payload<T>(body: &[u8]) -> Result<T, AppError>
where
    T: for<'de> Deserialize<'de> + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }

    serde_json::from_slice(body).map_err(|e| AppError::InvalidValue(format!("Invalid payload: {e}")))
}

fn bounded_millis(field: &str, ms: u64) -> Result<Duration, AppError> {
    if ms > MAX_DURATION_MS {
        return Err(AppError::InvalidValue(format!(
            "{field} must not exceed {MAX_DURATION_MS}"
        )));
    }
    Ok(Duration::from_millis(ms))
}

async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(json!({ "status": "error", "message": "Endpoint not found" }))
}

async fn method_not_allowed() -> HttpResponse {
    HttpResponse::MethodNotAllowed().finish()
}

fn guard_not_methods(methods: &[Method]) -> impl guard::Guard {
    let allowed: Vec<Method> = methods.to_vec();
    guard::fn_guard(move |ctx| !allowed.iter().any(|m| m == ctx.head().method))
}

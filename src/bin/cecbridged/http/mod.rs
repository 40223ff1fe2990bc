//! JSON API over HTTP
//!
//! All routes live under `/api`. Mutations answer `204 No Content` once the relevant frames have
//! been sent; queries that need a report from the bus answer `504` if none arrives in time.

use std::{future::Future, net::SocketAddr, str::FromStr};

use cecbridge::{
    AudioStatus, DeviceTarget, LogicalDevice, MuteAction, PowerStatus, VolumeOutcome, VolumeTarget,
};
use hyper::{Body, Request, Response, Server, StatusCode};
use routerify::{prelude::*, Middleware, Router, RouterService};
use routerify_query::{query_parser, RequestQueryExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::App;

mod error;
pub use error::{Error, FormattedError};

mod helpers;
use helpers::{no_content, parse_body, parse_integer, parse_param, serialize_response};

fn app() -> Result<&'static App, Error> {
    super::APP
        .get()
        .ok_or_else(|| anyhow::anyhow!("the application is still being initialized").into())
}

/// Whether the caller asked for the last known value instead of querying the bus
fn cached(req: &Request<Body>) -> bool {
    req.query("cached").is_some()
}

#[derive(Clone, Debug, Serialize, JsonSchema)]
pub struct Status {
    message: String,
}

#[derive(Clone, Debug, Deserialize, JsonSchema)]
pub struct InputRequest {
    /// Input port number, as a number or a string
    input: serde_json::Value,
}

#[derive(Clone, Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InputResponse {
    current_input: Option<u8>,
}

#[derive(Clone, Debug, Deserialize, JsonSchema)]
pub struct VolumeRequest {
    /// Target volume 0-100, as a number or a string
    volume: serde_json::Value,
}

#[derive(Clone, Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VolumeResponse {
    current_volume: Option<u8>,
    muted: Option<bool>,
}

impl From<Option<AudioStatus>> for VolumeResponse {
    fn from(status: Option<AudioStatus>) -> Self {
        Self {
            current_volume: status.map(|s| s.level),
            muted: status.map(|s| s.muted),
        }
    }
}

#[derive(Clone, Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    On,
    Off,
}

#[derive(Clone, Debug, Deserialize, JsonSchema)]
pub struct PowerRequest {
    state: PowerState,
}

#[derive(Clone, Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PowerResponse {
    device: String,
    power: PowerStatus,
}

async fn get_root(req: Request<Body>) -> Result<Response<Body>, Error> {
    serialize_response(
        &req,
        Status {
            message: "200 OK".to_string(),
        },
    )
}

/// Last known input port
async fn get_input(req: Request<Body>) -> Result<Response<Body>, Error> {
    let app = app()?;
    serialize_response(
        &req,
        InputResponse {
            current_input: app.bridge.input(),
        },
    )
}

/// Switches to the given input port
async fn put_input(mut req: Request<Body>) -> Result<Response<Body>, Error> {
    let body: InputRequest = parse_body(&mut req).await?;
    let port = parse_integer("input", &body.input)?;
    let port = u8::try_from(port).map_err(|_| Error::InvalidTarget(format!("input {}", port)))?;

    app()?.bridge.set_input(port).await?;
    no_content()
}

/// Queries the audio system, or returns the last known status with `?cached`
async fn get_volume(req: Request<Body>) -> Result<Response<Body>, Error> {
    let app = app()?;
    let status = if cached(&req) {
        app.bridge.volume()
    } else {
        Some(app.bridge.refresh_audio_status().await?)
    };
    serialize_response(&req, VolumeResponse::from(status))
}

/// Runs the volume controller until the level converges on the target
async fn put_volume(mut req: Request<Body>) -> Result<Response<Body>, Error> {
    let body: VolumeRequest = parse_body(&mut req).await?;
    let target = VolumeTarget::new(parse_integer("volume", &body.volume)?)?;
    let app = app()?;

    // Shutting down aborts any volume change in progress
    let outcome: VolumeOutcome = app
        .bridge
        .set_volume_target(target, app.shutdown.child_token())
        .await?;
    serialize_response(&req, outcome)
}

/// `1` if muted, `0` otherwise
async fn get_mute(req: Request<Body>) -> Result<Response<Body>, Error> {
    let app = app()?;
    let status = if cached(&req) {
        app.bridge.volume()
    } else {
        Some(app.bridge.refresh_audio_status().await?)
    };
    serialize_response(&req, status.map(|s| s.muted as u8))
}

async fn toggle_mute(_: Request<Body>) -> Result<Response<Body>, Error> {
    app()?.bridge.set_mute(MuteAction::Toggle).await?;
    no_content()
}

async fn put_mute(req: Request<Body>) -> Result<Response<Body>, Error> {
    let state: String = parse_param(&req, "muteStatus")?;
    let action = match state.as_str() {
        "on" => MuteAction::On,
        "off" => MuteAction::Off,
        _ => {
            return Err(Error::InvalidTarget(format!(
                "invalid mute state {:?}, expected on or off",
                state
            )))
        }
    };
    app()?.bridge.set_mute(action).await?;
    no_content()
}

async fn get_power(req: Request<Body>) -> Result<Response<Body>, Error> {
    let target: DeviceTarget = parse_param(&req, "device")?;
    let app = app()?;
    let power = if cached(&req) {
        app.bridge.power(&target)?
    } else {
        app.bridge.refresh_power(&target).await?
    };
    serialize_response(
        &req,
        PowerResponse {
            device: target.to_string(),
            power,
        },
    )
}

async fn put_power(mut req: Request<Body>) -> Result<Response<Body>, Error> {
    let target: DeviceTarget = parse_param(&req, "device")?;
    let body: PowerRequest = parse_body(&mut req).await?;
    app()?
        .bridge
        .set_power(&target, matches!(body.state, PowerState::On))
        .await?;
    no_content()
}

async fn delete_power(req: Request<Body>) -> Result<Response<Body>, Error> {
    let target: DeviceTarget = parse_param(&req, "device")?;
    app()?.bridge.set_power(&target, false).await?;
    no_content()
}

/// Sends `opcode:params` hex to the audio system
async fn put_rawcmd(req: Request<Body>) -> Result<Response<Body>, Error> {
    let cmd: String = parse_param(&req, "cmd")?;
    app()?.bridge.send_raw_frame(&cmd).await?;
    no_content()
}

async fn get_devices(req: Request<Body>) -> Result<Response<Body>, Error> {
    let devices: Vec<LogicalDevice> = app()?.bridge.devices();
    serialize_response(&req, devices)
}

async fn put_scan(_: Request<Body>) -> Result<Response<Body>, Error> {
    app()?.bridge.trigger_scan().await;
    no_content()
}

async fn schema_fn<T: JsonSchema>(req: Request<Body>) -> Result<Response<Body>, Error> {
    use schemars::schema_for;
    serialize_response(&req, schema_for!(T))
}

async fn logger(req: Request<Body>) -> Result<Request<Body>, Error> {
    log::info!("{} {} {}", req.remote_addr(), req.method(), req.uri().path());
    Ok(req)
}

async fn error_handler(err: routerify::RouteError) -> Response<Body> {
    let (status, body) = if let Some(err) = err.downcast_ref::<Error>() {
        let err: FormattedError = err.clone().into();
        log::warn!("request failed: {}", err);
        let body = serde_json::to_string_pretty(&err).unwrap_or_else(|e| {
            format!(
                "the error: '{:?}' couldn't be serialized as json: {:?}",
                err, e
            )
        });
        (err.status(), body)
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Something went wrong: {}", err),
        )
    };

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
}

fn router() -> Result<Router<Body, Error>, anyhow::Error> {
    Router::builder()
        .middleware(Middleware::pre(logger))
        .middleware(query_parser())
        .get("/api", get_root)
        .get("/api/input", get_input)
        .put("/api/input", put_input)
        .get("/api/input/put.schema", schema_fn::<InputRequest>)
        .get("/api/volume", get_volume)
        .put("/api/volume", put_volume)
        .get("/api/volume/get.schema", schema_fn::<VolumeResponse>)
        .get("/api/volume/put.schema", schema_fn::<VolumeRequest>)
        .get("/api/mute", get_mute)
        .put("/api/mute", toggle_mute)
        .put("/api/mute/:muteStatus", put_mute)
        .get("/api/power/:device", get_power)
        .put("/api/power/:device", put_power)
        .delete("/api/power/:device", delete_power)
        .get("/api/power/:device/put.schema", schema_fn::<PowerRequest>)
        .put("/api/rawcmd/:cmd", put_rawcmd)
        .get("/api/devices", get_devices)
        .get("/api/devices/get.schema", schema_fn::<Vec<LogicalDevice>>)
        .put("/api/scan", put_scan)
        .err_handler(error_handler)
        .build()
        .map_err(|e| anyhow::anyhow!("could not build http router: {}", e))
}

pub async fn main(
    bind_address: String,
    shutdown: impl Future<Output = ()>,
) -> Result<(), anyhow::Error> {
    let service = RouterService::new(router()?)
        .map_err(|e| anyhow::anyhow!("while building router service: {}", e))?;

    let addr = SocketAddr::from_str(&bind_address)?;
    let server = Server::try_bind(&addr)?
        .serve(service)
        .with_graceful_shutdown(shutdown);

    log::info!("listening on http://{}", addr);
    server.await?;
    Ok(())
}

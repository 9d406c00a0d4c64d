//! Single binary league server: the RPC surface over HTTP.
//! Run with: cargo run --bin web
//! Listens on 0.0.0.0:8080 by default. Override with env: HOST, PORT.
//! BABYFOOT_STORE_URL and BABYFOOT_ACCESS_KEY are required.

use actix_session::{storage::CookieSessionStore, Session, SessionMiddleware};
use actix_web::{
    cookie::Key,
    delete, dev::Payload, get, http::header, http::StatusCode, post, put,
    web::{self, Data, Json, Path},
    App, FromRequest, HttpRequest, HttpResponse, HttpServer, Responder,
};
use babyfoot_league::config::{ConfigEntry, DEFAULTS};
use babyfoot_league::stats::parse_date;
use babyfoot_league::{
    open_store, AppConfig, League, LeagueError, MatchId, MatchSubmission, MemoryStore, PlayerId,
    Store, ValidationError,
};
use chrono::{NaiveDate, Utc};
use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::{ready, Ready};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

type AppState = Data<League<MemoryStore>>;

const SESSION_PLAYER: &str = "player_id";

/// Expected value of the `apikey` header (or bearer token).
struct AccessKey(String);

/// Guard for every route except health: rejects requests without the access key.
struct Authorized;

impl FromRequest for Authorized {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let headers = req.headers();
        let given = headers
            .get("apikey")
            .and_then(|v| v.to_str().ok())
            .or_else(|| {
                headers
                    .get(header::AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.strip_prefix("Bearer "))
            });
        let allowed = matches!(
            (req.app_data::<Data<AccessKey>>(), given),
            (Some(key), Some(given)) if key.0 == given.trim()
        );
        ready(if allowed {
            Ok(Authorized)
        } else {
            Err(actix_web::error::ErrorUnauthorized("invalid or missing access key"))
        })
    }
}

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    service: &'static str,
}

#[derive(Deserialize)]
struct DeleteGameBody {
    #[serde(alias = "p_match_id")]
    match_id: MatchId,
    #[serde(default, alias = "p_requested_by", alias = "p_user_id", alias = "user_id")]
    requested_by: Option<PlayerId>,
}

/// A calendar date, or a full timestamp as sent by `new Date(...)` in a browser.
fn flexible_date<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
    match Option::<String>::deserialize(d)? {
        Some(raw) if !raw.trim().is_empty() => parse_date(&raw)
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

/// Optional JSON argument: only an absent or blank body falls back to the defaults.
fn optional_body<T: DeserializeOwned + Default>(raw: &[u8]) -> Result<T, LeagueError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(raw)
        .map_err(|e| LeagueError::from(ValidationError::MalformedBody(e.to_string())))
}

#[derive(Default, Deserialize)]
struct PlayerStatsBody {
    #[serde(default, alias = "p_player_id")]
    player_id: Option<PlayerId>,
    #[serde(default, alias = "p_month")]
    month: Option<String>,
}

#[derive(Default, Deserialize)]
struct PlayersLevelBody {
    #[serde(default)]
    include_disabled: bool,
}

#[derive(Default, Deserialize)]
struct BaseStatsBody {
    #[serde(default, alias = "p_date", deserialize_with = "flexible_date")]
    date: Option<NaiveDate>,
    #[serde(default, alias = "p_date_start", deserialize_with = "flexible_date")]
    date_start: Option<NaiveDate>,
    #[serde(default, alias = "p_date_end", deserialize_with = "flexible_date")]
    date_end: Option<NaiveDate>,
}

#[derive(Default, Deserialize)]
struct RangeBody {
    #[serde(
        default,
        alias = "p_start_date",
        alias = "start_date",
        alias = "target_start_date",
        deserialize_with = "flexible_date"
    )]
    start: Option<NaiveDate>,
    #[serde(
        default,
        alias = "p_end_date",
        alias = "end_date",
        alias = "target_end_date",
        deserialize_with = "flexible_date"
    )]
    end: Option<NaiveDate>,
    #[serde(
        default,
        alias = "p_player_id",
        alias = "player_id",
        alias = "target_player_id"
    )]
    player: Option<PlayerId>,
}

fn default_page() -> usize {
    1
}

fn default_per_page() -> usize {
    20
}

#[derive(Deserialize)]
struct HistoryBody {
    #[serde(default, alias = "player_id", alias = "p_player_id")]
    player: Option<PlayerId>,
    #[serde(default = "default_page")]
    page: usize,
    #[serde(default = "default_per_page")]
    per_page: usize,
}

impl Default for HistoryBody {
    fn default() -> Self {
        Self {
            player: None,
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

#[derive(Deserialize)]
struct WarningsBody {
    players: Vec<PlayerId>,
}

#[derive(Deserialize)]
struct PseudoBody {
    pseudo: String,
}

#[derive(Deserialize)]
struct DisableBody {
    disable: bool,
}

#[derive(Deserialize)]
struct SessionBody {
    player_id: PlayerId,
}

/// Path segment: player id (e.g. /api/players/{id}/pseudo)
#[derive(Deserialize)]
struct PlayerPath {
    id: PlayerId,
}

fn status_of(e: &LeagueError) -> StatusCode {
    match e {
        LeagueError::Validation(_) => StatusCode::BAD_REQUEST,
        LeagueError::Conflict(_) => StatusCode::CONFLICT,
        LeagueError::UnknownPlayer(_) => StatusCode::UNPROCESSABLE_ENTITY,
        LeagueError::MatchNotFound(_) => StatusCode::NOT_FOUND,
        LeagueError::InvalidLevelTable(_) | LeagueError::Storage(_) | LeagueError::Config(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_response(e: &LeagueError) -> HttpResponse {
    let status = status_of(e);
    if status.is_server_error() {
        log::error!("{}", e);
    }
    HttpResponse::build(status).json(serde_json::json!({
        "error": e.to_string(),
        "kind": e.kind(),
        "retryable": e.is_retryable(),
    }))
}

fn respond<T: Serialize>(result: Result<T, LeagueError>) -> HttpResponse {
    match result {
        Ok(value) => HttpResponse::Ok().json(value),
        Err(e) => error_response(&e),
    }
}

/// Stats are non-critical reads: failures are logged and answered with an empty body.
/// Bad arguments are still reported as such.
fn stats_response<T: Serialize + Default>(
    name: &str,
    result: Result<Arc<T>, LeagueError>,
) -> HttpResponse {
    match result {
        Ok(value) => HttpResponse::Ok().json(&*value),
        Err(e @ LeagueError::Validation(_)) => error_response(&e),
        Err(e) => {
            log::warn!("{} unavailable: {}", name, e);
            HttpResponse::Ok().json(T::default())
        }
    }
}

/// Run league work on the blocking pool (the engine is synchronous).
async fn run<T, F>(state: &AppState, f: F) -> Result<T, LeagueError>
where
    T: Send + 'static,
    F: FnOnce(&League<MemoryStore>) -> Result<T, LeagueError> + Send + 'static,
{
    let league = state.clone();
    web::block(move || f(league.get_ref()))
        .await
        .map_err(|e| LeagueError::Storage(format!("worker failed: {}", e)))?
}

#[get("/api/health")]
async fn api_health() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        ok: true,
        service: "babyfoot-league",
    })
}

/// Settle a match. `added_by` falls back to the player remembered in the session.
#[post("/rpc/process_match")]
async fn rpc_process_match(
    _: Authorized,
    state: AppState,
    session: Session,
    body: Json<MatchSubmission>,
) -> HttpResponse {
    let mut submission = body.into_inner();
    if submission.added_by.is_none() {
        submission.added_by = session.get::<PlayerId>(SESSION_PLAYER).ok().flatten();
    }
    respond(
        run(&state, move |league| league.process_match(&submission))
            .await
            .map(|settlement| settlement.results),
    )
}

#[post("/rpc/delete_game")]
async fn rpc_delete_game(
    _: Authorized,
    state: AppState,
    session: Session,
    body: Json<DeleteGameBody>,
) -> HttpResponse {
    let DeleteGameBody {
        match_id,
        requested_by,
    } = body.into_inner();
    let requested_by =
        requested_by.or_else(|| session.get::<PlayerId>(SESSION_PLAYER).ok().flatten());
    respond(
        run(&state, move |league| league.delete_game(match_id, requested_by))
            .await
            .map(|_| true),
    )
}

#[post("/rpc/get_player_stats")]
async fn rpc_get_player_stats(
    _: Authorized,
    state: AppState,
    body: web::Bytes,
) -> HttpResponse {
    let body = match optional_body::<PlayerStatsBody>(&body) {
        Ok(body) => body,
        Err(e) => return error_response(&e),
    };
    let result = run(&state, move |league| {
        league.get_player_stats(body.player_id, body.month.as_deref())
    })
    .await;
    stats_response("player stats", result)
}

#[post("/rpc/get_players_level")]
async fn rpc_get_players_level(
    _: Authorized,
    state: AppState,
    body: web::Bytes,
) -> HttpResponse {
    let body = match optional_body::<PlayersLevelBody>(&body) {
        Ok(body) => body,
        Err(e) => return error_response(&e),
    };
    let result = run(&state, move |league| {
        league.get_players_level(body.include_disabled)
    })
    .await;
    stats_response("players level", result)
}

#[post("/rpc/get_base_match_stats")]
async fn rpc_get_base_match_stats(
    _: Authorized,
    state: AppState,
    body: web::Bytes,
) -> HttpResponse {
    let body = match optional_body::<BaseStatsBody>(&body) {
        Ok(body) => body,
        Err(e) => return error_response(&e),
    };
    let result = run(&state, move |league| {
        league.get_base_match_stats(body.date, body.date_start, body.date_end)
    })
    .await;
    stats_response("base match stats", result)
}

#[post("/rpc/get_complex_stats")]
async fn rpc_get_complex_stats(
    _: Authorized,
    state: AppState,
    body: web::Bytes,
) -> HttpResponse {
    let body = match optional_body::<RangeBody>(&body) {
        Ok(body) => body,
        Err(e) => return error_response(&e),
    };
    let result = run(&state, move |league| {
        league.get_complex_stats(body.start, body.end, body.player)
    })
    .await;
    stats_response("complex stats", result)
}

#[post("/rpc/get_historical_stats")]
async fn rpc_get_historical_stats(
    _: Authorized,
    state: AppState,
    body: web::Bytes,
) -> HttpResponse {
    let body = match optional_body::<RangeBody>(&body) {
        Ok(body) => body,
        Err(e) => return error_response(&e),
    };
    let result = run(&state, move |league| {
        league.get_historical_stats(body.player, body.start, body.end)
    })
    .await;
    stats_response("historical stats", result)
}

#[post("/rpc/get_level_info")]
async fn rpc_get_level_info(_: Authorized, state: AppState) -> HttpResponse {
    respond(run(&state, |league| league.get_level_info()).await)
}

#[get("/api/levels")]
async fn api_levels(_: Authorized, state: AppState) -> HttpResponse {
    respond(run(&state, |league| league.get_level_info()).await)
}

#[post("/rpc/get_match_history")]
async fn rpc_get_match_history(
    _: Authorized,
    state: AppState,
    body: web::Bytes,
) -> HttpResponse {
    let body = match optional_body::<HistoryBody>(&body) {
        Ok(body) => body,
        Err(e) => return error_response(&e),
    };
    let result = run(&state, move |league| {
        league.get_match_history(body.player, body.page, body.per_page)
    })
    .await;
    stats_response("match history", result)
}

#[post("/rpc/match_warnings")]
async fn rpc_match_warnings(
    _: Authorized,
    state: AppState,
    body: Json<WarningsBody>,
) -> HttpResponse {
    let players = body.into_inner().players;
    respond(run(&state, move |league| league.match_warnings(&players)).await)
}

#[post("/rpc/weekly_decay")]
async fn rpc_weekly_decay(_: Authorized, state: AppState) -> HttpResponse {
    respond(run(&state, |league| league.weekly_decay(Utc::now())).await)
}

#[post("/rpc/reset_hp_mana")]
async fn rpc_reset_hp_mana(_: Authorized, state: AppState) -> HttpResponse {
    respond(
        run(&state, |league| league.reset_hp_mana())
            .await
            .map(|players| serde_json::json!({ "players": players })),
    )
}

/// Effective game constants: stored values over documented defaults.
#[get("/api/config")]
async fn api_config(_: Authorized, state: AppState) -> HttpResponse {
    respond(
        run(&state, |league| {
            let config = league.game_config()?;
            let mut all: BTreeMap<String, ConfigEntry> = DEFAULTS
                .iter()
                .map(|(key, _, description)| {
                    let entry = ConfigEntry {
                        value: config.get(key),
                        description: Some(description.to_string()),
                    };
                    (key.to_string(), entry)
                })
                .collect();
            for (key, entry) in config.entries() {
                all.entry(key.to_string()).or_insert_with(|| entry.clone());
            }
            Ok(all)
        })
        .await,
    )
}

#[post("/api/players")]
async fn api_register_player(
    _: Authorized,
    state: AppState,
    body: Json<PseudoBody>,
) -> HttpResponse {
    let pseudo = body.into_inner().pseudo;
    respond(run(&state, move |league| league.register_player(&pseudo)).await)
}

#[put("/api/players/{id}/pseudo")]
async fn api_update_pseudo(
    _: Authorized,
    state: AppState,
    path: Path<PlayerPath>,
    body: Json<PseudoBody>,
) -> HttpResponse {
    let id = path.id;
    let pseudo = body.into_inner().pseudo;
    respond(run(&state, move |league| league.update_pseudo(id, &pseudo)).await)
}

#[put("/api/players/{id}/disable")]
async fn api_set_disabled(
    _: Authorized,
    state: AppState,
    path: Path<PlayerPath>,
    body: Json<DisableBody>,
) -> HttpResponse {
    let id = path.id;
    let disable = body.disable;
    respond(run(&state, move |league| league.set_disabled(id, disable)).await)
}

/// Remember who is submitting from this browser.
#[post("/api/session")]
async fn api_login(
    _: Authorized,
    state: AppState,
    session: Session,
    body: Json<SessionBody>,
) -> HttpResponse {
    let id = body.player_id;
    let player = match run(&state, move |league| {
        league.ledger().store().load_players(&[id])
    })
    .await
    {
        Ok(mut rows) => rows.pop(),
        Err(e) => return error_response(&e),
    };
    match session.insert(SESSION_PLAYER, id) {
        Ok(()) => HttpResponse::Ok().json(player),
        Err(e) => {
            HttpResponse::InternalServerError().json(serde_json::json!({ "error": e.to_string() }))
        }
    }
}

#[delete("/api/session")]
async fn api_logout(_: Authorized, session: Session) -> HttpResponse {
    session.purge();
    HttpResponse::NoContent().finish()
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::from_env().map_err(|e| {
        log::error!("{}", e);
        std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
    })?;
    let store = open_store(&config.store_url).map_err(|e| {
        log::error!("cannot open store: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
    })?;
    let state: AppState = Data::new(League::new(Arc::new(store)));
    let access_key = Data::new(AccessKey(config.access_key.clone()));
    let session_key = Key::generate();

    let bind = (config.host.clone(), config.port);
    log::info!("Starting server at http://{}:{}", bind.0, bind.1);

    // Background task: log every ledger change
    let mut events = state.subscribe();
    actix_web::rt::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(line) => log::info!("ledger event {}", line),
                    Err(_) => log::info!("ledger event {:?}", event),
                },
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("event log skipped {} events", skipped)
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // Background task: weekly regeneration and exp decay
    if config.decay_interval_hours > 0 {
        let state_decay = state.clone();
        let period = Duration::from_secs(config.decay_interval_hours * 3600);
        actix_web::rt::spawn(async move {
            let mut interval = actix_web::rt::time::interval(period);
            // first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                match run(&state_decay, |league| league.weekly_decay(Utc::now())).await {
                    Ok(records) => log::info!("Weekly decay touched {} player(s)", records.len()),
                    Err(e) => log::warn!("Weekly decay failed: {}", e),
                }
            }
        });
    }

    HttpServer::new(move || {
        App::new()
            .wrap(
                SessionMiddleware::builder(CookieSessionStore::default(), session_key.clone())
                    .cookie_secure(false)
                    .build(),
            )
            .app_data(state.clone())
            .app_data(access_key.clone())
            .service(api_health)
            .service(rpc_process_match)
            .service(rpc_delete_game)
            .service(rpc_get_player_stats)
            .service(rpc_get_players_level)
            .service(rpc_get_base_match_stats)
            .service(rpc_get_complex_stats)
            .service(rpc_get_historical_stats)
            .service(rpc_get_level_info)
            .service(rpc_get_match_history)
            .service(rpc_match_warnings)
            .service(rpc_weekly_decay)
            .service(rpc_reset_hp_mana)
            .service(api_levels)
            .service(api_config)
            .service(api_register_player)
            .service(api_update_pseudo)
            .service(api_set_disabled)
            .service(api_login)
            .service(api_logout)
    })
    .bind(bind)?
    .run()
    .await
}

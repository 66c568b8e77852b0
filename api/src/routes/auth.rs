use actix_web::{get, post, web::Json, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use xerror::api::FacadeError;

/// The mobile wallet probes this before authenticating; the expected
/// answer is a bad-auth error.
#[get("/getinfo")]
pub async fn getinfo() -> Result<HttpResponse, FacadeError> {
    Err(FacadeError::BadAuth)
}

#[derive(Deserialize)]
pub struct AuthData {
    pub login: String,
    pub password: String,
}

/// Echoes the supplied pair back as both tokens; verification happens on
/// every authenticated call against the derived credential.
#[post("/auth")]
pub async fn auth(auth_data: Json<AuthData>) -> Result<HttpResponse, FacadeError> {
    let token = base64::encode(format!("{}:{}", auth_data.login, auth_data.password));
    Ok(HttpResponse::Ok().json(json!({
        "refresh_token": token,
        "access_token": token,
    })))
}

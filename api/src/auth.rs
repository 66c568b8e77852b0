use actix_web::{dev::Payload, FromRequest, HttpRequest};
use futures::future::{err, ok, Ready};

use models::accounts::Account;
use xerror::api::FacadeError;

use crate::{ApiSettings, WebDbPool};

/// Credentials as presented: `Authorization: Bearer base64(uid:token)`.
/// Verification happens per-route against the derived account credential.
#[derive(Debug, Clone)]
pub struct FacadeAuth {
    pub uid: i64,
    pub token: String,
}

impl FromRequest for FacadeAuth {
    type Error = FacadeError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let header = match req.headers().get("Authorization").and_then(|h| h.to_str().ok()) {
            Some(header) => header.trim(),
            None => return err(FacadeError::BadAuth),
        };
        let token = header.rsplit(' ').next().unwrap_or_default();

        let decoded = match base64::decode(token) {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(s) => s,
                Err(_) => return err(FacadeError::BadAuth),
            },
            Err(_) => return err(FacadeError::BadAuth),
        };

        let mut parts = decoded.splitn(2, ':');
        let uid = match parts.next().and_then(|p| p.parse::<i64>().ok()) {
            Some(uid) => uid,
            None => return err(FacadeError::BadAuth),
        };
        let token = match parts.next() {
            Some(token) => token.to_string(),
            None => return err(FacadeError::BadAuth),
        };

        ok(FacadeAuth { uid, token })
    }
}

/// Loads the account and checks the supplied token against the credential
/// derived from the service secret and the account's salt.
pub fn authorize(
    pool: &WebDbPool,
    settings: &ApiSettings,
    auth: &FacadeAuth,
) -> Result<Account, FacadeError> {
    let conn = pool.get().map_err(|_| FacadeError::Internal)?;
    let account = Account::get_by_id(&conn, auth.uid).map_err(|_| FacadeError::BadAuth)?;
    if account.credential(&settings.service_secret) != auth.token {
        return Err(FacadeError::BadAuth);
    }
    Ok(account)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    fn auth_from(header: &str) -> Result<FacadeAuth, FacadeError> {
        let req = TestRequest::default()
            .insert_header(("Authorization", header))
            .to_http_request();
        futures::executor::block_on(FacadeAuth::from_request(&req, &mut Payload::None))
    }

    #[test]
    fn parses_bearer_credentials() {
        let token = base64::encode("42:abcdef0123");
        let auth = auth_from(&format!("Bearer {}", token)).unwrap();
        assert_eq!(auth.uid, 42);
        assert_eq!(auth.token, "abcdef0123");
    }

    #[test]
    fn rejects_garbage() {
        assert!(auth_from("Bearer not-base64!!!").is_err());
        assert!(auth_from(&format!("Bearer {}", base64::encode("nocolon"))).is_err());
        assert!(auth_from(&format!("Bearer {}", base64::encode("x:token"))).is_err());
    }
}

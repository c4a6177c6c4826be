use super::error::HttpError;
use crate::validation::FromValidate;

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest},
    http::Request,
};
use validator::Validate;

pub struct Json<J>(pub J);

#[async_trait]
impl<S, B, J> FromRequest<S, B> for Json<J>
where
    B: Send + 'static,
    S: Send + Sync,
    J: FromValidate + 'static,
    axum::Json<<J as FromValidate>::Validatable>: FromRequest<S, B, Rejection = JsonRejection>,
{
    type Rejection = HttpError;

    async fn from_request(req: Request<B>, state: &S) -> Result<Self, Self::Rejection> {
        let axum::Json(req) =
            axum::Json::<<J as FromValidate>::Validatable>::from_request(req, state)
                .await
                .map_err(|err| HttpError::Unprocessable(format!("{err}")))?;
        req.validate().map_err(HttpError::Validation)?;
        Ok(Self(FromValidate::from(req)))
    }
}

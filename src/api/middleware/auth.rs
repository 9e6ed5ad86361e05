//! JWT authentication middleware.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use uuid::Uuid;

use crate::api::AppState;
use crate::domain::{Claims, UserRole};
use crate::errors::AppError;

/// Authenticated user taken from verified access-token claims
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub id: Uuid,
    pub role: UserRole,
}

impl CurrentUser {
    /// Check if user has admin role.
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

impl From<Claims> for CurrentUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            role: claims.role,
        }
    }
}

/// JWT authentication middleware.
///
/// Verifies the bearer token from the Authorization header, then injects
/// the CurrentUser into the request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let TypedHeader(authorization) = bearer.ok_or(AppError::Unauthorized)?;

    let claims = state
        .auth_service
        .verify_access(authorization.token())
        .inspect_err(|e| tracing::warn!(error = %e, "Access token rejected"))?;

    request.extensions_mut().insert(CurrentUser::from(claims));

    Ok(next.run(request).await)
}

/// Admin gate. Must run after [`auth_middleware`].
pub async fn admin_middleware(request: Request, next: Next) -> Result<Response, AppError> {
    let user = request
        .extensions()
        .get::<CurrentUser>()
        .ok_or(AppError::Unauthorized)?;
    require_admin(user)?;

    Ok(next.run(request).await)
}

/// Require admin role, returns Forbidden error if not admin.
pub fn require_admin(user: &CurrentUser) -> Result<(), AppError> {
    if user.is_admin() {
        Ok(())
    } else {
        tracing::warn!(user_id = %user.id, "Admin route refused");
        Err(AppError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_require_admin() {
        let admin = CurrentUser {
            id: Uuid::new_v4(),
            role: UserRole::Admin,
        };
        let user = CurrentUser {
            id: Uuid::new_v4(),
            role: UserRole::User,
        };

        assert!(require_admin(&admin).is_ok());
        assert!(matches!(require_admin(&user), Err(AppError::Forbidden)));
    }
}

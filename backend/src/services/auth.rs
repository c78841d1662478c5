//! Authentication service for user registration, login, and token management

use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::services::notification::NotificationService;
use shared::models::{User, UserRole};

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    db: PgPool,
    jwt_secret: String,
    access_token_expiry: i64,
    refresh_token_expiry: i64,
}

/// Input for registering a new customer account
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterInput {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 120))]
    pub name: String,
}

/// Input for logging in
#[derive(Debug, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

/// Input for refreshing tokens
#[derive(Debug, Deserialize)]
pub struct RefreshInput {
    pub refresh_token: String,
}

/// Input for verifying an email address
#[derive(Debug, Deserialize)]
pub struct VerifyEmailInput {
    pub token: String,
}

/// Authentication tokens
#[derive(Debug, Serialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Response after registration or login
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    #[serde(flatten)]
    pub tokens: AuthTokens,
}

/// Access token claims
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub email_verified: bool,
    pub exp: i64,
    pub iat: i64,
}

/// Claims for refresh and email-verification tokens
#[derive(Debug, Serialize, Deserialize)]
struct PurposeClaims {
    sub: String,
    purpose: String,
    exp: i64,
    iat: i64,
}

/// User info from database
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    name: String,
    role: String,
    email_verified: bool,
    is_active: bool,
    created_at: chrono::DateTime<Utc>,
}

const USER_COLUMNS: &str =
    "id, email, password_hash, name, role, email_verified, is_active, created_at";

impl AuthService {
    /// Create a new AuthService instance
    pub fn new(db: PgPool, config: &Config) -> Self {
        Self {
            db,
            jwt_secret: config.jwt.secret.clone(),
            access_token_expiry: config.jwt.access_token_expiry,
            refresh_token_expiry: config.jwt.refresh_token_expiry,
        }
    }

    /// Register a new customer account and send a verification email
    /// (best-effort)
    pub async fn register(
        &self,
        input: RegisterInput,
        notifications: &NotificationService,
    ) -> AppResult<AuthResponse> {
        input.validate()?;

        let existing = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users WHERE email = $1",
        )
        .bind(&input.email)
        .fetch_one(&self.db)
        .await?;
        if existing > 0 {
            return Err(AppError::DuplicateEntry("email".to_string()));
        }

        let password_hash = hash(&input.password, DEFAULT_COST)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;

        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (email, password_hash, name, role)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#,
        ))
        .bind(&input.email)
        .bind(&password_hash)
        .bind(&input.name)
        .bind(UserRole::Customer.as_str())
        .fetch_one(&self.db)
        .await?;

        let user = user_from_row(row)?;

        let verification_token =
            self.create_purpose_token(user.id, "email_verification", Duration::days(2))?;
        notifications
            .send_verification_email(&user.email, &verification_token)
            .await;

        let tokens = self.issue_tokens(&user)?;
        Ok(AuthResponse { user, tokens })
    }

    /// Log in with email and password
    pub async fn login(&self, input: LoginInput) -> AppResult<AuthResponse> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1",
        ))
        .bind(&input.email)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

        let valid = verify(&input.password, &row.password_hash)
            .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))?;
        if !valid {
            return Err(AppError::InvalidCredentials);
        }
        if !row.is_active {
            return Err(AppError::Forbidden("Account is deactivated".to_string()));
        }

        let user = user_from_row(row)?;
        let tokens = self.issue_tokens(&user)?;
        Ok(AuthResponse { user, tokens })
    }

    /// Exchange a refresh token for a fresh token pair
    pub async fn refresh(&self, input: RefreshInput) -> AppResult<AuthTokens> {
        let claims = self.decode_purpose_token(&input.refresh_token, "refresh")?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::InvalidToken)?;

        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND is_active = true",
        ))
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::InvalidToken)?;

        let user = user_from_row(row)?;
        self.issue_tokens(&user)
    }

    /// Mark an email address as verified using the emailed token
    pub async fn verify_email(&self, input: VerifyEmailInput) -> AppResult<()> {
        let claims = self.decode_purpose_token(&input.token, "email_verification")?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::InvalidToken)?;

        let result = sqlx::query(
            "UPDATE users SET email_verified = true WHERE id = $1",
        )
        .bind(user_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User".to_string()));
        }
        Ok(())
    }

    fn issue_tokens(&self, user: &User) -> AppResult<AuthTokens> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            role: user.role.as_str().to_string(),
            email_verified: user.email_verified,
            exp: (now + Duration::seconds(self.access_token_expiry)).timestamp(),
            iat: now.timestamp(),
        };

        let access_token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Token creation failed: {}", e)))?;

        let refresh_token = self.create_purpose_token(
            user.id,
            "refresh",
            Duration::seconds(self.refresh_token_expiry),
        )?;

        Ok(AuthTokens {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.access_token_expiry,
        })
    }

    fn create_purpose_token(
        &self,
        user_id: Uuid,
        purpose: &str,
        lifetime: Duration,
    ) -> AppResult<String> {
        let now = Utc::now();
        let claims = PurposeClaims {
            sub: user_id.to_string(),
            purpose: purpose.to_string(),
            exp: (now + lifetime).timestamp(),
            iat: now.timestamp(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Token creation failed: {}", e)))
    }

    fn decode_purpose_token(&self, token: &str, purpose: &str) -> AppResult<PurposeClaims> {
        let data = decode::<PurposeClaims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::TokenExpired,
            _ => AppError::InvalidToken,
        })?;

        if data.claims.purpose != purpose {
            return Err(AppError::InvalidToken);
        }
        Ok(data.claims)
    }
}

fn user_from_row(row: UserRow) -> AppResult<User> {
    let role = UserRole::parse(&row.role)
        .ok_or_else(|| AppError::Internal(format!("Unknown user role: {}", row.role)))?;
    Ok(User {
        id: row.id,
        email: row.email,
        name: row.name,
        role,
        email_verified: row.email_verified,
        is_active: row.is_active,
        created_at: row.created_at,
    })
}

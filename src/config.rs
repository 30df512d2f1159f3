use std::env;

pub struct StripeSettings {
    pub secret_key: String,
    pub webhook_secret: String,
}

pub struct Config {
    pub database_url: String,
    pub frontend_origin: String,
    pub bind_addr: String,
    pub stripe: StripeSettings,
    pub jwt_issuer: String,
    pub jwt_audience: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok(); // Load .env file

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let frontend_origin = env::var("FRONTEND_ORIGIN").expect("FRONTEND_ORIGIN must be set");
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let stripe = StripeSettings {
            secret_key: env::var("STRIPE_SECRET_KEY").expect("STRIPE_SECRET_KEY must be set"),
            webhook_secret: env::var("STRIPE_WEBHOOK_SECRET")
                .expect("STRIPE_WEBHOOK_SECRET must be set"),
        };

        let jwt_issuer = env::var("JWT_ISSUER").expect("JWT_ISSUER must be set");
        let jwt_audience = env::var("JWT_AUDIENCE").expect("JWT_AUDIENCE must be set");

        Config {
            database_url,
            frontend_origin,
            bind_addr,
            stripe,
            jwt_issuer,
            jwt_audience,
        }
    }
}

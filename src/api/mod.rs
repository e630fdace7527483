use std::sync::Arc;

use log::error;
use rocket::fairing::AdHoc;
use rocket::figment::Figment;
use rocket::{Build, Rocket};

use crate::admission::AdmissionControl;
use crate::config::Config;
use crate::key_types::KeyMaterial;
use crate::protocol::{Notary, Verifier};

pub mod catchers;
pub mod cors;
pub mod endpoints;
pub mod guards;
pub mod types;

use self::cors::{Cors, CorsPolicy};
use self::guards::CallerSource;

/// The service as deployed. The signing key is loaded during ignition; if it
/// cannot be, ignition fails and nothing is served.
pub fn setup_rocket(figment: Figment) -> Rocket<Build> {
    rocket::custom(figment)
        .attach(Cors)
        .attach(AdHoc::try_on_ignite("Signing Key", |rocket| async move {
            let loaded = Config::from_figment(rocket.figment()).and_then(|config| {
                let keys = KeyMaterial::load(&config)?;
                Ok((config, keys))
            });

            match loaded {
                Ok((config, keys)) => Ok(assemble(rocket, keys, &config)),
                Err(e) => {
                    error!("cannot start: {}", e.render_chain());
                    Err(rocket)
                }
            }
        }))
}

/// Wire already-loaded key material and config into `rocket`.
pub fn assemble(rocket: Rocket<Build>, keys: KeyMaterial, config: &Config) -> Rocket<Build> {
    let keys = Arc::new(keys);
    let verifier = Verifier::new(keys.public_key().clone());

    rocket
        .manage(Notary::new(keys))
        .manage(verifier)
        .manage(AdmissionControl::new(config.admission.clone()))
        .manage(CorsPolicy::new(config.cors_origins.clone()))
        .manage(CallerSource::new(config.trust_ip_header))
        .mount(
            "/api",
            routes![
                endpoints::timestamp,
                endpoints::public_key,
                endpoints::verify,
                endpoints::preflight,
            ],
        )
        .register("/", catchers![catchers::too_many_requests, catchers::default_catcher])
}

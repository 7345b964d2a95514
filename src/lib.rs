pub mod config;
pub mod db;
pub mod dedup;
pub mod events;
pub mod mentions;
pub mod models;
pub mod registry;
pub mod routes;
pub mod runtime;
pub mod wire;

use config::HubConfig;
use db::Db;
use dedup::CorrelationCache;
use events::EventBus;
use registry::SessionRegistry;
use rocket_cors::CorsOptions;
use std::time::Duration;

pub fn rocket() -> rocket::Rocket<rocket::Build> {
    rocket_with_config(HubConfig::from_env())
}

pub fn rocket_with_config(config: HubConfig) -> rocket::Rocket<rocket::Build> {
    let db = Db::new_in_memory();
    let events = EventBus::new();
    let registry = SessionRegistry::new(&config);
    let dedup = CorrelationCache::new(Duration::from_millis(config.dedup_window_ms));

    // Handles for the eviction reaper, taken BEFORE handing state to Rocket.
    let reaper_registry = registry.clone();
    let reaper_events = events.sender.clone();
    let reaper_db = db.clone();
    let grace_ms = config.reconnect_grace_ms;

    let cors = CorsOptions::default()
        .to_cors()
        .expect("Failed to create CORS");

    rocket::build()
        .manage(db)
        .manage(events)
        .manage(registry)
        .manage(dedup)
        .manage(config)
        .attach(cors)
        .register(
            "/",
            rocket::catchers![routes::not_found, routes::unauthorized],
        )
        .mount(
            "/",
            rocket::routes![
                routes::health,
                routes::stats,
                routes::open_session,
                routes::close_session,
                routes::session_stream,
                routes::list_agents,
                routes::create_thread,
                routes::get_thread,
                routes::add_participant,
                routes::remove_participant,
                routes::close_thread,
                routes::send_message,
                routes::wait_mentions,
            ],
        )
        .attach(rocket::fairing::AdHoc::on_liftoff(
            "Session Reaper",
            move |_rocket| {
                Box::pin(async move {
                    registry::spawn_eviction_task(
                        reaper_registry,
                        reaper_events,
                        reaper_db,
                        grace_ms,
                    );
                    println!("🧹 Session reaper started (grace {grace_ms} ms)");
                })
            },
        ))
}

use std::env;
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;

use shipper_route::config::{HereConfig, SimulationConfig, WatchOptions};
use shipper_route::engine::{
    GeocodingAdapter, LocationTracker, RouteProvider, RouteSession, SessionEvent,
};
use shipper_route::entities::{Coordinates, TrackedPosition};
use shipper_route::error::{invalid_input_error, Error};
use shipper_route::external::here_maps::HereMaps;
use shipper_route::simulation::ReplayProvider;

/// Within this many kilometers of the destination the demo ends.
const ARRIVAL_KM: f64 = 0.05;

#[tokio::main]
async fn main() -> Result<(), Error> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let mut args = env::args().skip(1);
    let origin: Coordinates = args.next().ok_or_else(invalid_input_error)?.parse()?;
    let address = args.collect::<Vec<_>>().join(" ");

    let here = Arc::new(HereMaps::new(HereConfig::from_env()?)?);
    let geocoding = GeocodingAdapter::new(here.clone());
    let routes = Arc::new(RouteProvider::new(here, SimulationConfig::default()));

    let (destination, origin_address) =
        futures::join!(geocoding.forward(&address), geocoding.reverse(origin));

    if let Some(origin_address) = origin_address {
        println!("from: {}", origin_address.formatted_address);
    }

    let destination = match destination {
        Some(destination) => destination,
        None => {
            println!("no location found for {:?}", address);
            return Ok(());
        }
    };

    // the demo drives along the first route it gets
    let preview = routes.fetch_route(origin, destination).await;
    let provider = ReplayProvider::along_route(&preview, Some(5.0));
    let tracker = LocationTracker::new(Arc::new(provider), WatchOptions::default());

    let session = RouteSession::new(geocoding, routes, tracker);
    session.set_origin(TrackedPosition::new(origin, None))?;
    session.set_destination(destination)?;

    let route = session.refresh_route().await?;
    println!(
        "route: {} points, {}, {}",
        route.coordinates.len(),
        route.distance_text,
        route.duration_text
    );

    let mut events = session.subscribe();
    session.start_tracking()?;

    loop {
        let event = tokio::select! {
            event = events.recv() => event,
            _ = tokio::signal::ctrl_c() => break,
        };

        match event {
            Ok(SessionEvent::PositionUpdated(position)) => {
                println!(
                    "at {}: {} to go, eta {}",
                    String::from(position.coordinates),
                    session.current_distance_text().unwrap_or_default(),
                    session.eta_text().unwrap_or_default()
                );

                if session.current_distance_km().unwrap_or(f64::MAX) < ARRIVAL_KM {
                    println!("arrived");
                    break;
                }
            }
            Ok(SessionEvent::RouteUpdated(route)) => {
                println!("route updated: {}, {}", route.distance_text, route.duration_text);
            }
            Ok(SessionEvent::TrackingEnded) => {
                println!("no more positions");
                break;
            }
            Ok(SessionEvent::Notice(err)) => println!("location notice: {}", err),
            Err(RecvError::Lagged(skipped)) => tracing::warn!("skipped {} events", skipped),
            Err(RecvError::Closed) => break,
        }
    }

    session.close();

    Ok(())
}

//! Gateway construction from configuration.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{Config, VenueConfig};
use crate::domain::VenueId;

use super::{sim::SimVenue, MarketDataGateway};

/// Build one gateway per configured venue.
pub fn build_gateways(config: &Config) -> HashMap<VenueId, Arc<dyn MarketDataGateway>> {
    config
        .venues
        .iter()
        .map(|(name, venue_config)| {
            let gateway: Arc<dyn MarketDataGateway> = match venue_config {
                VenueConfig::Sim(sim) => Arc::new(SimVenue::from_config(name.clone(), sim)),
            };
            (VenueId::new(name.clone()), gateway)
        })
        .collect()
}

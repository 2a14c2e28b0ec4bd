use std::sync::Arc;

use evhop_catalog::{PricingEngine, VehicleAllowList};
use evhop_order::{HtmlInvoiceRenderer, InvoiceRenderer};
use evhop_store::app_config::{Config, HotelConfig};
use evhop_store::{open_session_store, BackendClient, GuestTokenProvider, SessionBackend};

use crate::desk::Desk;

#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<BackendClient>,
    pub pricing: Arc<PricingEngine>,
    pub allow_list: Arc<VehicleAllowList>,
    pub hotels: Arc<Vec<HotelConfig>>,
    pub invoices: Arc<dyn InvoiceRenderer>,
    pub desk: Arc<Desk>,
}

impl AppState {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let backend = BackendClient::new(&config.backend)?;
        let pricing = Arc::new(PricingEngine::new(config.route_catalog()));
        let allow_list = Arc::new(config.allow_list());

        // The desk's own account; browser calls keep forwarding their bearer
        let session = open_session_store(config)?;
        let tokens = Arc::new(GuestTokenProvider::new(Arc::new(backend.clone()), session));
        let desk = Desk::new(
            config.desk.access_key.clone(),
            Arc::new(SessionBackend::new(backend.clone(), tokens)),
            pricing.clone(),
            allow_list.clone(),
        );

        Ok(Self {
            backend: Arc::new(backend),
            pricing,
            allow_list,
            hotels: Arc::new(config.hotels.clone()),
            invoices: Arc::new(HtmlInvoiceRenderer::new("EVHop")),
            desk: Arc::new(desk),
        })
    }

    pub fn hotel(&self, slug: &str) -> Option<&HotelConfig> {
        self.hotels.iter().find(|h| h.slug == slug)
    }
}

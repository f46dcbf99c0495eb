use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::costs::round2;
use crate::model::{
    CENTS_PER_ACRE, Crop, CropId, Customer, CustomerId, ExtentUnit, Layout, LayoutId, NewCrop,
    NewPricingTier, PaymentMode, Plot, PlotId, PricingTier, TierId, TierPatch, TierStatus,
};
use crate::session::SessionContext;
use crate::{Error, targets};

pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, Error>> + Send + 'a>>;

/// REST contract of the farm server.
pub trait FarmApi: Send + Sync {
    fn list_pricing_tiers(&self, crop_id: CropId) -> ApiFuture<'_, Vec<PricingTier>>;
    fn create_pricing_tier(&self, tier: NewPricingTier) -> ApiFuture<'_, PricingTier>;
    fn update_pricing_tier(&self, id: TierId, patch: TierPatch) -> ApiFuture<'_, PricingTier>;
    fn delete_pricing_tier(&self, id: TierId) -> ApiFuture<'_, ()>;
    fn list_crops(&self) -> ApiFuture<'_, Vec<Crop>>;
    fn create_crop(&self, name: String) -> ApiFuture<'_, Crop>;
    fn update_crop(&self, id: CropId, name: String) -> ApiFuture<'_, Crop>;
    fn delete_crop(&self, id: CropId) -> ApiFuture<'_, ()>;
    fn list_layouts(&self) -> ApiFuture<'_, Vec<Layout>>;
    fn list_layout_plots(&self, layout_id: LayoutId) -> ApiFuture<'_, Vec<Plot>>;
    fn list_customers(&self) -> ApiFuture<'_, Vec<Customer>>;

    /// Same backend, sending requests as `session`.
    fn authenticated(&self, session: SessionContext) -> Arc<dyn FarmApi>;
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// JSON over HTTP. Failures are returned as-is; retrying is left to the user.
#[derive(Debug, Clone)]
pub struct HttpFarmApi {
    config: ApiConfig,
    client: Client,
    session: SessionContext,
}

impl HttpFarmApi {
    pub fn new(config: ApiConfig) -> Self {
        Self {
            config,
            client: Client::new(),
            session: SessionContext::anonymous(),
        }
    }

    /// Same client, authenticated with another session value.
    pub fn with_session(&self, session: SessionContext) -> Self {
        Self {
            config: self.config.clone(),
            client: self.client.clone(),
            session,
        }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match self.session.bearer_token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        endpoint: String,
        request: RequestBuilder,
    ) -> Result<T, Error> {
        let body = self.execute(&endpoint, request).await?;
        serde_json::from_slice(&body).map_err(|error| {
            warn!(
                target: targets::API,
                endpoint = %endpoint,
                error = %error,
                "Response decode failed"
            );
            Error::Decode {
                endpoint,
                details: error.to_string(),
            }
        })
    }

    async fn execute(&self, endpoint: &str, request: RequestBuilder) -> Result<Vec<u8>, Error> {
        let timeout_ms = u64::try_from(self.config.timeout.as_millis()).unwrap_or(u64::MAX);
        debug!(
            target: targets::API,
            endpoint = %endpoint,
            timeout_ms,
            authenticated = self.session.is_authenticated(),
            "API request"
        );

        let response = match timeout(self.config.timeout, request.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(error)) => {
                warn!(target: targets::API, endpoint = %endpoint, error = %error, "API request failed");
                return Err(Error::Transport {
                    endpoint: endpoint.to_string(),
                    details: error.to_string(),
                });
            }
            Err(_) => {
                warn!(target: targets::API, endpoint = %endpoint, timeout_ms, "API request timed out");
                return Err(Error::Timeout {
                    endpoint: endpoint.to_string(),
                    timeout_ms,
                });
            }
        };

        let status = response.status();
        let body = response.bytes().await.map_err(|error| Error::Transport {
            endpoint: endpoint.to_string(),
            details: error.to_string(),
        })?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!(target: targets::API, endpoint = %endpoint, status = status.as_u16(), "API request not authorised");
            return Err(Error::Unauthorized {
                endpoint: endpoint.to_string(),
            });
        }
        if !status.is_success() {
            warn!(target: targets::API, endpoint = %endpoint, status = status.as_u16(), "API request rejected");
            return Err(Error::HttpStatus {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body: Some(String::from_utf8_lossy(&body).chars().take(512).collect()),
            });
        }

        debug!(
            target: targets::API,
            endpoint = %endpoint,
            status = status.as_u16(),
            bytes = body.len(),
            "API request ok"
        );
        Ok(body.to_vec())
    }
}

impl FarmApi for HttpFarmApi {
    fn list_pricing_tiers(&self, crop_id: CropId) -> ApiFuture<'_, Vec<PricingTier>> {
        Box::pin(async move {
            let path = format!("/crops/{crop_id}/pricing");
            let request = self.request(Method::GET, &path);
            self.fetch(format!("GET {path}"), request).await
        })
    }

    fn create_pricing_tier(&self, tier: NewPricingTier) -> ApiFuture<'_, PricingTier> {
        Box::pin(async move {
            let request = self.request(Method::POST, "/pricing").json(&tier);
            self.fetch("POST /pricing".to_string(), request).await
        })
    }

    fn update_pricing_tier(&self, id: TierId, patch: TierPatch) -> ApiFuture<'_, PricingTier> {
        Box::pin(async move {
            let path = format!("/pricing/{id}");
            let request = self.request(Method::PATCH, &path).json(&patch);
            self.fetch(format!("PATCH {path}"), request).await
        })
    }

    fn delete_pricing_tier(&self, id: TierId) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            let path = format!("/pricing/{id}");
            let request = self.request(Method::DELETE, &path);
            self.execute(&format!("DELETE {path}"), request).await?;
            Ok(())
        })
    }

    fn list_crops(&self) -> ApiFuture<'_, Vec<Crop>> {
        Box::pin(async move {
            let request = self.request(Method::GET, "/crops/");
            self.fetch("GET /crops/".to_string(), request).await
        })
    }

    fn create_crop(&self, name: String) -> ApiFuture<'_, Crop> {
        Box::pin(async move {
            let request = self
                .request(Method::POST, "/crops/")
                .json(&NewCrop { name });
            self.fetch("POST /crops/".to_string(), request).await
        })
    }

    fn update_crop(&self, id: CropId, name: String) -> ApiFuture<'_, Crop> {
        Box::pin(async move {
            let path = format!("/crops/{id}");
            let request = self.request(Method::PATCH, &path).json(&NewCrop { name });
            self.fetch(format!("PATCH {path}"), request).await
        })
    }

    fn delete_crop(&self, id: CropId) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            let path = format!("/crops/{id}");
            let request = self.request(Method::DELETE, &path);
            self.execute(&format!("DELETE {path}"), request).await?;
            Ok(())
        })
    }

    fn list_layouts(&self) -> ApiFuture<'_, Vec<Layout>> {
        Box::pin(async move {
            let request = self.request(Method::GET, "/layouts");
            self.fetch("GET /layouts".to_string(), request).await
        })
    }

    fn list_layout_plots(&self, layout_id: LayoutId) -> ApiFuture<'_, Vec<Plot>> {
        Box::pin(async move {
            let path = format!("/layouts/{layout_id}/plots");
            let request = self.request(Method::GET, &path);
            self.fetch(format!("GET {path}"), request).await
        })
    }

    fn list_customers(&self) -> ApiFuture<'_, Vec<Customer>> {
        Box::pin(async move {
            let request = self.request(Method::GET, "/customers");
            self.fetch("GET /customers".to_string(), request).await
        })
    }

    fn authenticated(&self, session: SessionContext) -> Arc<dyn FarmApi> {
        Arc::new(self.with_session(session))
    }
}

#[derive(Debug, Default)]
struct MockState {
    crops: Vec<Crop>,
    tiers: Vec<PricingTier>,
    layouts: Vec<Layout>,
    plots: Vec<Plot>,
    customers: Vec<Customer>,
    failures: VecDeque<Error>,
    calls: Vec<String>,
    bearer_token: Option<String>,
    next_id: u64,
}

impl MockState {
    fn mint_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }
}

/// In-memory farm server. Scripted failures are returned, in order, by the
/// next calls regardless of operation.
#[derive(Debug, Clone, Default)]
pub struct MockFarmApi {
    state: Arc<Mutex<MockState>>,
}

impl MockFarmApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_crop(self, crop: Crop) -> Self {
        self.mutate(|state| state.crops.push(crop));
        self
    }

    pub fn with_tier(self, tier: PricingTier) -> Self {
        self.mutate(|state| state.tiers.push(tier));
        self
    }

    pub fn with_layout(self, layout: Layout) -> Self {
        self.mutate(|state| state.layouts.push(layout));
        self
    }

    pub fn with_plot(self, plot: Plot) -> Self {
        self.mutate(|state| state.plots.push(plot));
        self
    }

    pub fn with_customer(self, customer: Customer) -> Self {
        self.mutate(|state| state.customers.push(customer));
        self
    }

    /// One crop with cash and EMI tiers, one layout with a few plots. Backs
    /// the offline mode of the desktop app.
    pub fn with_demo_data() -> Self {
        let mango = CropId::new("demo-mango");
        let layout_id = LayoutId::new("demo-layout");
        let mut api = Self::new()
            .with_crop(Crop {
                id: mango.clone(),
                name: "Mango".to_string(),
            })
            .with_crop(Crop {
                id: CropId::new("demo-teak"),
                name: "Teak".to_string(),
            })
            .with_layout(Layout {
                id: layout_id.clone(),
                name: "Green Acres".to_string(),
                address: "Survey 42".to_string(),
                city: "Hosur".to_string(),
                state: "Tamil Nadu".to_string(),
                zip_code: "635109".to_string(),
                country: "India".to_string(),
                area_in_acres: 40.0,
                description: None,
                center_coordinates: None,
                number_of_plots: Some(3),
            })
            .with_customer(Customer {
                id: CustomerId::new("demo-customer"),
                first_name: "Anitha".to_string(),
                middle_name: None,
                last_name: "Raman".to_string(),
                phone: Some("+91 90000 00000".to_string()),
                email: None,
                city: Some("Hosur".to_string()),
            });

        let bands = [
            ("Small", PaymentMode::Outright, 0.0, 0.99, 6000.0, None),
            ("Standard", PaymentMode::Outright, 1.0, 5.0, 5000.0, None),
            ("Estate", PaymentMode::Outright, 5.01, 50.0, 4200.0, None),
            ("Standard EMI", PaymentMode::Emi, 1.0, 5.0, 5500.0, Some(2500.0)),
        ];
        for (index, (name, mode, min, max, cost, emi)) in bands.into_iter().enumerate() {
            api = api.with_tier(PricingTier {
                id: TierId::new(format!("demo-tier-{}", index + 1)),
                crop_id: mango.clone(),
                name: name.to_string(),
                payment_mode: mode,
                status: TierStatus::Active,
                extent_unit: ExtentUnit::Acre,
                extent_min_value: min,
                extent_max_value: max,
                cost_per_acre: cost,
                cost_per_cent: round2(cost / CENTS_PER_ACRE),
                cost_per_sqft: None,
                total_cost_per_acre: None,
                emi_per_month: emi,
                valid_from: None,
                valid_to: None,
                description: None,
            });
        }

        for (number, area) in [("1", 0.5), ("2", 3.0), ("3", 12.0)] {
            api = api.with_plot(Plot {
                id: PlotId::new(format!("demo-plot-{number}")),
                layout_id: layout_id.clone(),
                customer_id: None,
                crop_id: Some(mango.clone()),
                number: number.to_string(),
                name: String::new(),
                area_in_acres: area,
                is_active: true,
                is_sold: false,
                description: None,
                center_coordinates: None,
            });
        }
        api
    }

    pub fn push_failure(&self, error: Error) {
        self.mutate(|state| state.failures.push_back(error));
    }

    /// Operations seen so far, e.g. `"list_pricing_tiers mango"`.
    pub fn calls(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|state| state.calls.clone())
            .unwrap_or_default()
    }

    /// Token of the session last handed to `authenticated`.
    pub fn bearer_token(&self) -> Option<String> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.bearer_token.clone())
    }

    fn mutate(&self, apply: impl FnOnce(&mut MockState)) {
        if let Ok(mut state) = self.state.lock() {
            apply(&mut state);
        }
    }

    fn call<R>(
        &self,
        operation: String,
        handler: impl FnOnce(&mut MockState) -> Result<R, Error>,
    ) -> Result<R, Error> {
        let Ok(mut state) = self.state.lock() else {
            return Err(Error::MockExhausted { operation });
        };
        debug!(target: targets::API, operation = %operation, "Mock API call");
        state.calls.push(operation);
        if let Some(error) = state.failures.pop_front() {
            return Err(error);
        }
        handler(&mut state)
    }
}

fn not_found(endpoint: String) -> Error {
    Error::HttpStatus {
        endpoint,
        status: 404,
        body: None,
    }
}

impl FarmApi for MockFarmApi {
    fn list_pricing_tiers(&self, crop_id: CropId) -> ApiFuture<'_, Vec<PricingTier>> {
        let result = self.call(format!("list_pricing_tiers {crop_id}"), |state| {
            Ok(state
                .tiers
                .iter()
                .filter(|tier| tier.crop_id == crop_id)
                .cloned()
                .collect())
        });
        Box::pin(async move { result })
    }

    fn create_pricing_tier(&self, tier: NewPricingTier) -> ApiFuture<'_, PricingTier> {
        let result = self.call(format!("create_pricing_tier {}", tier.crop_id), |state| {
            let id = TierId::new(state.mint_id("tier"));
            let created = tier.into_tier(id);
            state.tiers.push(created.clone());
            Ok(created)
        });
        Box::pin(async move { result })
    }

    fn update_pricing_tier(&self, id: TierId, patch: TierPatch) -> ApiFuture<'_, PricingTier> {
        let operation = format!("update_pricing_tier {id}");
        let result = self.call(operation.clone(), |state| {
            let tier = state
                .tiers
                .iter_mut()
                .find(|tier| tier.id == id)
                .ok_or_else(|| not_found(operation))?;
            patch.apply_to(tier);
            Ok(tier.clone())
        });
        Box::pin(async move { result })
    }

    fn delete_pricing_tier(&self, id: TierId) -> ApiFuture<'_, ()> {
        let operation = format!("delete_pricing_tier {id}");
        let result = self.call(operation.clone(), |state| {
            let before = state.tiers.len();
            state.tiers.retain(|tier| tier.id != id);
            if state.tiers.len() == before {
                return Err(not_found(operation));
            }
            Ok(())
        });
        Box::pin(async move { result })
    }

    fn list_crops(&self) -> ApiFuture<'_, Vec<Crop>> {
        let result = self.call("list_crops".to_string(), |state| Ok(state.crops.clone()));
        Box::pin(async move { result })
    }

    fn create_crop(&self, name: String) -> ApiFuture<'_, Crop> {
        let result = self.call(format!("create_crop {name}"), |state| {
            let crop = Crop {
                id: CropId::new(state.mint_id("crop")),
                name,
            };
            state.crops.push(crop.clone());
            Ok(crop)
        });
        Box::pin(async move { result })
    }

    fn update_crop(&self, id: CropId, name: String) -> ApiFuture<'_, Crop> {
        let operation = format!("update_crop {id}");
        let result = self.call(operation.clone(), |state| {
            let crop = state
                .crops
                .iter_mut()
                .find(|crop| crop.id == id)
                .ok_or_else(|| not_found(operation))?;
            crop.name = name;
            Ok(crop.clone())
        });
        Box::pin(async move { result })
    }

    /// Tiers of the crop go with it.
    fn delete_crop(&self, id: CropId) -> ApiFuture<'_, ()> {
        let operation = format!("delete_crop {id}");
        let result = self.call(operation.clone(), |state| {
            let before = state.crops.len();
            state.crops.retain(|crop| crop.id != id);
            if state.crops.len() == before {
                return Err(not_found(operation));
            }
            state.tiers.retain(|tier| tier.crop_id != id);
            Ok(())
        });
        Box::pin(async move { result })
    }

    fn list_layouts(&self) -> ApiFuture<'_, Vec<Layout>> {
        let result = self.call("list_layouts".to_string(), |state| Ok(state.layouts.clone()));
        Box::pin(async move { result })
    }

    fn list_layout_plots(&self, layout_id: LayoutId) -> ApiFuture<'_, Vec<Plot>> {
        let result = self.call(format!("list_layout_plots {layout_id}"), |state| {
            Ok(state
                .plots
                .iter()
                .filter(|plot| plot.layout_id == layout_id)
                .cloned()
                .collect())
        });
        Box::pin(async move { result })
    }

    fn list_customers(&self) -> ApiFuture<'_, Vec<Customer>> {
        let result = self.call("list_customers".to_string(), |state| {
            Ok(state.customers.clone())
        });
        Box::pin(async move { result })
    }

    /// Shares state with `self`; only the token is remembered.
    fn authenticated(&self, session: SessionContext) -> Arc<dyn FarmApi> {
        self.mutate(|state| state.bearer_token = session.bearer_token().map(str::to_string));
        Arc::new(self.clone())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::catalog::tests::tier;

    pub(crate) fn run_future<T>(future: impl Future<Output = T>) -> T {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .expect("tokio runtime");
        runtime.block_on(future)
    }

    #[test]
    fn mock_lists_only_tiers_of_the_requested_crop() {
        let mut foreign = tier("teak-1", 0.0, 10.0, 9000.0);
        foreign.crop_id = CropId::new("teak");
        let api = MockFarmApi::new()
            .with_tier(tier("mango-1", 1.0, 5.0, 5000.0))
            .with_tier(foreign);

        let tiers = run_future(api.list_pricing_tiers(CropId::new("mango"))).expect("tiers");
        assert_eq!(tiers.len(), 1);
        assert_eq!(tiers[0].id, TierId::new("mango-1"));
        assert_eq!(api.calls(), vec!["list_pricing_tiers mango".to_string()]);
    }

    #[test]
    fn mock_create_assigns_server_id() {
        let api = MockFarmApi::new();
        let crop = run_future(api.create_crop("Mango".to_string())).expect("crop");
        assert_eq!(crop.id, CropId::new("crop-1"));

        let body = NewPricingTier {
            crop_id: crop.id.clone(),
            name: "Small".to_string(),
            payment_mode: crate::model::PaymentMode::Emi,
            status: crate::model::TierStatus::Active,
            extent_unit: crate::model::ExtentUnit::Acre,
            extent_min_value: 1.0,
            extent_max_value: 5.0,
            cost_per_acre: 5000.0,
            cost_per_cent: 50.0,
            cost_per_sqft: None,
            total_cost_per_acre: None,
            emi_per_month: Some(2500.0),
            valid_from: None,
            valid_to: None,
            description: None,
        };
        let created = run_future(api.create_pricing_tier(body)).expect("created");
        assert_eq!(created.id, TierId::new("tier-2"));
        assert!(!created.id.is_temporary());

        let listed = run_future(api.list_pricing_tiers(crop.id)).expect("tiers");
        assert_eq!(listed, vec![created]);
    }

    #[test]
    fn mock_update_and_delete_unknown_tier_are_not_found() {
        let api = MockFarmApi::new();
        let error = run_future(api.delete_pricing_tier(TierId::new("missing")))
            .expect_err("missing tier");
        assert!(matches!(error, Error::HttpStatus { status: 404, .. }));

        let error = run_future(api.update_pricing_tier(TierId::new("missing"), TierPatch::default()))
            .expect_err("missing tier");
        assert!(error.is_retryable());
    }

    #[test]
    fn mock_rename_and_delete_crop() {
        let api = MockFarmApi::with_demo_data();
        let mango = CropId::new("demo-mango");

        let renamed = run_future(api.update_crop(mango.clone(), "Alphonso".to_string()))
            .expect("renamed");
        assert_eq!(renamed.name, "Alphonso");
        let crops = run_future(api.list_crops()).expect("crops");
        assert!(crops.iter().any(|crop| crop.id == mango && crop.name == "Alphonso"));

        run_future(api.delete_crop(mango.clone())).expect("deleted");
        assert!(run_future(api.list_pricing_tiers(mango.clone())).expect("tiers").is_empty());
        assert_eq!(run_future(api.list_crops()).expect("crops").len(), 1);

        let error = run_future(api.delete_crop(mango.clone())).expect_err("already gone");
        assert!(matches!(error, Error::HttpStatus { status: 404, .. }));
        let error = run_future(api.update_crop(mango, "Again".to_string())).expect_err("gone");
        assert!(matches!(error, Error::HttpStatus { status: 404, .. }));
    }

    #[test]
    fn authenticated_mock_shares_state_and_keeps_the_token() {
        let api = MockFarmApi::new();
        let payload = base64::Engine::encode(
            &base64::engine::general_purpose::URL_SAFE_NO_PAD,
            br#"{"exp":5000}"#,
        );
        let token = format!("header.{payload}.signature");
        let session = SessionContext::from_id_token(&token, 0).expect("session");

        let signed_in = api.authenticated(session);
        run_future(signed_in.create_crop("Mango".to_string())).expect("crop");

        assert_eq!(api.bearer_token(), Some(token));
        assert_eq!(run_future(api.list_crops()).expect("crops").len(), 1);
    }

    #[test]
    fn scripted_failure_is_returned_once() {
        let api = MockFarmApi::new().with_crop(Crop {
            id: CropId::new("mango"),
            name: "Mango".to_string(),
        });
        api.push_failure(Error::Transport {
            endpoint: "GET /crops/".to_string(),
            details: "connection refused".to_string(),
        });

        assert!(run_future(api.list_crops()).is_err());
        assert_eq!(run_future(api.list_crops()).expect("crops").len(), 1);
    }

    #[test]
    fn demo_data_prices_every_demo_plot() {
        let api = MockFarmApi::with_demo_data();
        let crops = run_future(api.list_crops()).expect("crops");
        let tiers = run_future(api.list_pricing_tiers(crops[0].id.clone())).expect("tiers");
        let layouts = run_future(api.list_layouts()).expect("layouts");
        let plots = run_future(api.list_layout_plots(layouts[0].id.clone())).expect("plots");

        assert_eq!(plots.len(), 3);
        for plot in plots {
            assert!(
                crate::catalog::find_applicable_tier(&tiers, plot.area_in_acres).is_some(),
                "no tier for {}",
                plot.label()
            );
        }
    }

    #[test]
    fn http_client_builds_urls_without_double_slashes() {
        let api = HttpFarmApi::new(ApiConfig {
            base_url: "http://farm.example/".to_string(),
            timeout: Duration::from_secs(1),
        });
        assert_eq!(api.url("/crops/mango/pricing"), "http://farm.example/crops/mango/pricing");
    }
}

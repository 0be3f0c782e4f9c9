//! Application state management for coindash.
//!
//! This module contains the core `App` struct that owns the session, the
//! query layer and all UI state, and coordinates background fetches.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use futures::future::join_all;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use coindash_core::api::{ApiError, ApiResult, ErrorKind};
use coindash_core::auth::{CredentialStore, KeyValueStore};
use coindash_core::models::{
    resolve_watchlist, ChatMessage, ChatRequest, ChatResponse, ChatSession, Coin, CoinDetail,
    GainersLosers, MarketData, NewsArticle, PortfolioEntry, PriceHistory, SearchResult,
    TimeRange, WatchlistItem,
};
use coindash_core::queries::{DEFAULT_NEWS_LIMIT, DEFAULT_TOP_COINS, POLL_INTERVAL};
use coindash_core::{
    ApiClient, CancellationReceiver, CancellationToken, ChatQueries, CoinQueries, Config,
    GatewayEvent, QueryCache, QueryKey, SessionStatus, SessionStore, Theme,
};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background fetch channel
const CHANNEL_BUFFER_SIZE: usize = 32;

const MAX_USERNAME_LENGTH: usize = 50;

const MAX_EMAIL_LENGTH: usize = 254;

const MAX_PASSWORD_LENGTH: usize = 128;

const MAX_CHAT_INPUT_LENGTH: usize = 2000;

const MAX_SEARCH_LENGTH: usize = 64;

const MAX_PORTFOLIO_INPUT_LENGTH: usize = 64;

/// Headlines shown on the coin tab
const COIN_NEWS_LIMIT: usize = 5;

// ============================================================================
// UI State Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tab {
    Dashboard,
    Coin,
    Watchlist,
    Portfolio,
    Chat,
}

impl Tab {
    pub const ALL: [Tab; 5] = [
        Tab::Dashboard,
        Tab::Coin,
        Tab::Watchlist,
        Tab::Portfolio,
        Tab::Chat,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Tab::Dashboard => "Dashboard",
            Tab::Coin => "Coin",
            Tab::Watchlist => "Watchlist",
            Tab::Portfolio => "Portfolio",
            Tab::Chat => "Chat",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            Tab::Dashboard => Tab::Coin,
            Tab::Coin => Tab::Watchlist,
            Tab::Watchlist => Tab::Portfolio,
            Tab::Portfolio => Tab::Chat,
            Tab::Chat => Tab::Dashboard,
        }
    }

    pub fn prev(&self) -> Self {
        match self {
            Tab::Dashboard => Tab::Chat,
            Tab::Coin => Tab::Dashboard,
            Tab::Watchlist => Tab::Coin,
            Tab::Portfolio => Tab::Watchlist,
            Tab::Chat => Tab::Portfolio,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    Searching,
    ShowingHelp,
    LoggingIn,
    Composing,
    EditingPortfolio,
    ConfirmingQuit,
    Quitting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginMode {
    Login,
    Register,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoginFocus {
    Username,
    Email,
    Password,
    Button,
    SwitchMode,
}

impl LoginFocus {
    /// Next field; the email field only exists when registering.
    pub fn next(self, mode: LoginMode) -> Self {
        match (self, mode) {
            (LoginFocus::Username, LoginMode::Register) => LoginFocus::Email,
            (LoginFocus::Username, LoginMode::Login) => LoginFocus::Password,
            (LoginFocus::Email, _) => LoginFocus::Password,
            (LoginFocus::Password, _) => LoginFocus::Button,
            (LoginFocus::Button, _) => LoginFocus::SwitchMode,
            (LoginFocus::SwitchMode, _) => LoginFocus::Username,
        }
    }

    pub fn prev(self, mode: LoginMode) -> Self {
        match (self, mode) {
            (LoginFocus::Username, _) => LoginFocus::SwitchMode,
            (LoginFocus::Email, _) => LoginFocus::Username,
            (LoginFocus::Password, LoginMode::Register) => LoginFocus::Email,
            (LoginFocus::Password, LoginMode::Login) => LoginFocus::Username,
            (LoginFocus::Button, _) => LoginFocus::Password,
            (LoginFocus::SwitchMode, _) => LoginFocus::Button,
        }
    }
}

// ============================================================================
// Background Task Results
// ============================================================================

/// Messages sent from background fetches to the UI loop.
#[derive(Debug)]
enum FetchResult {
    /// Top coins by market cap (never fails, empty on error)
    TopCoins(Vec<Coin>),
    /// Aggregate market figures
    Market(MarketData),
    /// Biggest 24h movers
    Movers(GainersLosers),
    Trending(Vec<Coin>),
    News(Vec<NewsArticle>),
    /// Live quote for the selected coin
    Coin(Coin),
    CoinDetail(CoinDetail),
    PriceHistory(PriceHistory),
    /// Headlines for a coin (coin_id, articles)
    CoinNews(String, Vec<NewsArticle>),
    /// Watchlist resolved to full coins
    Watchlist(Vec<Coin>),
    /// Portfolio entries and the quotes used to value them
    Portfolio(Vec<PortfolioEntry>, Vec<Coin>),
    ChatSessions(Vec<ChatSession>),
    /// A stored conversation was loaded
    ChatSession(ChatSession),
    ChatSuggestions(Vec<String>),
    ChatReply(ChatResponse),
    ChatFailed(String),
    /// Search results for a query (query, results)
    SearchResults(String, Vec<SearchResult>),
    /// A mutation succeeded; the tab's data should be reloaded
    Mutated(Tab, String),
    MutationFailed(String),
    /// A tab's primary fetch failed
    Failed(Tab, String),
    /// A tab's fetch finished
    Done(Tab),
}

/// Parsed portfolio form input.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioInput {
    pub coin_id: Option<String>,
    pub amount: f64,
    pub price: f64,
}

// ============================================================================
// App
// ============================================================================

pub struct App {
    // Services
    pub config: Config,
    pub session: SessionStore,
    pub coins: CoinQueries,
    pub chat: ChatQueries,
    store: Arc<dyn KeyValueStore>,
    gateway_events: broadcast::Receiver<GatewayEvent>,

    // UI state
    pub state: AppState,
    pub current_tab: Tab,
    pub theme: Theme,
    pub status_message: Option<String>,
    pub tab_errors: HashMap<Tab, String>,
    pub loading: bool,

    // Login
    pub login_mode: LoginMode,
    pub login_focus: LoginFocus,
    pub login_username: String,
    pub login_email: String,
    pub login_password: String,
    pub login_error: Option<String>,

    // Dashboard
    pub top_coins: Vec<Coin>,
    pub market: Option<MarketData>,
    pub movers: GainersLosers,
    pub trending: Vec<Coin>,
    pub news: Vec<NewsArticle>,
    pub dashboard_selection: usize,

    // Coin
    pub selected_coin: Option<String>,
    pub coin: Option<Coin>,
    pub coin_detail: Option<CoinDetail>,
    pub price_history: Option<PriceHistory>,
    pub coin_news: Vec<NewsArticle>,
    pub time_range: TimeRange,

    // Watchlist
    pub watchlist: Vec<Coin>,
    pub watchlist_selection: usize,

    // Portfolio
    pub portfolio: Vec<PortfolioEntry>,
    pub portfolio_prices: Vec<Coin>,
    pub portfolio_selection: usize,
    pub portfolio_input: String,
    pub editing_entry: Option<String>,

    // Chat
    pub chat_sessions: Vec<ChatSession>,
    pub chat_session_selection: usize,
    pub chat_session_id: Option<String>,
    pub chat_messages: Vec<ChatMessage>,
    pub chat_input: String,
    pub chat_suggestions: Vec<String>,
    pub chat_pending: bool,

    // Search
    pub search_query: String,
    pub search_results: Vec<SearchResult>,
    pub search_selection: usize,

    // Background tasks
    fetch_tx: mpsc::Sender<FetchResult>,
    fetch_rx: Option<mpsc::Receiver<FetchResult>>,
    tab_cancel: Option<CancellationToken>,
    chart_cancel: Option<CancellationToken>,
    last_poll: Instant,
}

impl App {
    /// Build the app against the configured storage backend.
    pub fn new(config: Config) -> Result<Self> {
        let store = config
            .open_store()
            .context("Failed to open credential storage")?;
        Self::with_store(config, store)
    }

    pub fn with_store(config: Config, store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let gateway = ApiClient::new(
            config.base_url(),
            config.request_timeout(),
            CredentialStore::new(Arc::clone(&store)),
        )?;
        let gateway_events = gateway.subscribe();

        let cache = QueryCache::new();
        let session = SessionStore::new(gateway.clone());
        let coins = CoinQueries::new(gateway.clone(), cache.clone());
        let chat = ChatQueries::new(gateway, cache);

        let theme = Theme::load(store.as_ref());
        let login_username = config.last_username.clone().unwrap_or_default();
        let (fetch_tx, fetch_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);

        Ok(Self {
            config,
            session,
            coins,
            chat,
            store,
            gateway_events,

            state: AppState::Normal,
            current_tab: Tab::Dashboard,
            theme,
            status_message: None,
            tab_errors: HashMap::new(),
            loading: false,

            login_mode: LoginMode::Login,
            login_focus: LoginFocus::Username,
            login_username,
            login_email: String::new(),
            login_password: String::new(),
            login_error: None,

            top_coins: Vec::new(),
            market: None,
            movers: GainersLosers::default(),
            trending: Vec::new(),
            news: Vec::new(),
            dashboard_selection: 0,

            selected_coin: None,
            coin: None,
            coin_detail: None,
            price_history: None,
            coin_news: Vec::new(),
            time_range: TimeRange::default(),

            watchlist: Vec::new(),
            watchlist_selection: 0,

            portfolio: Vec::new(),
            portfolio_prices: Vec::new(),
            portfolio_selection: 0,
            portfolio_input: String::new(),
            editing_entry: None,

            chat_sessions: Vec::new(),
            chat_session_selection: 0,
            chat_session_id: None,
            chat_messages: Vec::new(),
            chat_input: String::new(),
            chat_suggestions: Vec::new(),
            chat_pending: false,

            search_query: String::new(),
            search_results: Vec::new(),
            search_selection: 0,

            fetch_tx,
            fetch_rx: Some(fetch_rx),
            tab_cancel: None,
            chart_cancel: None,
            last_poll: Instant::now(),
        })
    }

    // ========================================================================
    // Session
    // ========================================================================

    /// Restore the stored session, or show the login overlay.
    pub async fn start(&mut self) {
        match self.session.initialize().await {
            SessionStatus::Authenticated => {
                info!("Restored previous session");
                self.refresh_current_tab();
            }
            _ => self.start_login(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    pub fn start_login(&mut self) {
        self.state = AppState::LoggingIn;
        self.login_mode = LoginMode::Login;
        self.login_focus = if self.login_username.is_empty() {
            LoginFocus::Username
        } else {
            LoginFocus::Password
        };
        self.login_password.clear();
        self.cancel_tab_fetch();
    }

    pub fn toggle_login_mode(&mut self) {
        self.login_mode = match self.login_mode {
            LoginMode::Login => LoginMode::Register,
            LoginMode::Register => LoginMode::Login,
        };
        self.login_error = None;
        self.login_focus = LoginFocus::Username;
    }

    /// Submit the login or registration form.
    pub async fn attempt_login(&mut self) -> ApiResult<()> {
        let username = self.login_username.trim().to_string();
        let password = self.login_password.clone();
        let email = self.login_email.trim().to_string();

        if username.is_empty() || password.is_empty() {
            self.login_error = Some("Username and password required".to_string());
            return Ok(());
        }
        if self.login_mode == LoginMode::Register && !email.contains('@') {
            self.login_error = Some("A valid email address is required".to_string());
            return Ok(());
        }

        self.login_error = None;

        let result = match self.login_mode {
            LoginMode::Login => self.session.login(&username, &password).await,
            LoginMode::Register => self.session.register(&username, &email, &password).await,
        };

        match result {
            Ok(user) => {
                self.config.last_username = Some(username);
                if let Err(e) = self.config.save() {
                    warn!(error = %e, "Failed to save config");
                }

                self.login_password.clear();
                self.login_email.clear();
                self.state = AppState::Normal;
                self.status_message = Some(format!("Welcome, {}", user.display_name()));
                info!("Login successful");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Login failed");
                self.login_error = Some(login_error_message(&e, self.login_mode));
                Err(e)
            }
        }
    }

    pub async fn logout(&mut self) {
        self.cancel_tab_fetch();
        self.session.logout().await;
        self.coins.cache().clear();
        self.clear_user_data();
        self.start_login();
    }

    /// Drop everything that belongs to the signed-in user.
    fn clear_user_data(&mut self) {
        self.watchlist.clear();
        self.portfolio.clear();
        self.portfolio_prices.clear();
        self.chat_sessions.clear();
        self.chat_messages.clear();
        self.chat_session_id = None;
        self.chat_pending = false;
        self.tab_errors.clear();
    }

    fn handle_gateway_event(&mut self, event: GatewayEvent) {
        let changed = self.session.handle_gateway_event(event);
        debug!(?event, changed, "Gateway event");

        if !matches!(self.state, AppState::LoggingIn) {
            self.clear_user_data();
            self.start_login();
            self.login_error = Some("Your session has expired. Please log in again.".to_string());
        }
    }

    // ========================================================================
    // Preferences
    // ========================================================================

    pub fn toggle_theme(&mut self) {
        self.theme = self.theme.toggle();
        if let Err(e) = self.theme.save(self.store.as_ref()) {
            warn!(error = %e, "Failed to save theme");
        }
        self.status_message = Some(format!("Theme: {}", self.theme));
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    pub fn switch_tab(&mut self, tab: Tab) {
        if tab == self.current_tab {
            return;
        }
        self.current_tab = tab;
        self.status_message = None;
        self.refresh_current_tab();
    }

    /// Show a coin on the coin tab.
    pub fn open_coin(&mut self, id: &str) {
        if self.selected_coin.as_deref() != Some(id) {
            self.selected_coin = Some(id.to_string());
            self.coin = None;
            self.coin_detail = None;
            self.price_history = None;
            self.coin_news.clear();
        }
        if self.current_tab == Tab::Coin {
            self.refresh_current_tab();
        } else {
            self.switch_tab(Tab::Coin);
        }
    }

    /// Id of the coin under the cursor on the current tab
    pub fn highlighted_coin_id(&self) -> Option<String> {
        match self.current_tab {
            Tab::Dashboard => self
                .top_coins
                .get(self.dashboard_selection)
                .map(|c| c.id.clone()),
            Tab::Coin => self.selected_coin.clone(),
            Tab::Watchlist => self
                .watchlist
                .get(self.watchlist_selection)
                .map(|c| c.id.clone()),
            Tab::Portfolio => self
                .portfolio
                .get(self.portfolio_selection)
                .map(|e| e.coin_id.clone()),
            Tab::Chat => None,
        }
    }

    /// Number of rows in the current tab's list
    pub fn list_len(&self) -> usize {
        match self.current_tab {
            Tab::Dashboard => self.top_coins.len(),
            Tab::Coin => 0,
            Tab::Watchlist => self.watchlist.len(),
            Tab::Portfolio => self.portfolio.len(),
            Tab::Chat => self.chat_sessions.len(),
        }
    }

    fn selection_mut(&mut self) -> Option<&mut usize> {
        match self.current_tab {
            Tab::Dashboard => Some(&mut self.dashboard_selection),
            Tab::Coin => None,
            Tab::Watchlist => Some(&mut self.watchlist_selection),
            Tab::Portfolio => Some(&mut self.portfolio_selection),
            Tab::Chat => Some(&mut self.chat_session_selection),
        }
    }

    pub fn move_selection(&mut self, delta: isize) {
        let len = self.list_len();
        if let Some(selection) = self.selection_mut() {
            *selection = step_selection(*selection, delta, len);
        }
    }

    // ========================================================================
    // Background Fetches
    // ========================================================================

    fn cancel_tab_fetch(&mut self) {
        if let Some(token) = self.tab_cancel.take() {
            token.cancel();
        }
        if let Some(token) = self.chart_cancel.take() {
            token.cancel();
        }
        self.loading = false;
    }

    /// Fetch the current tab's data, cancelling whatever the previous tab
    /// still had in flight.
    pub fn refresh_current_tab(&mut self) {
        self.cancel_tab_fetch();
        if !self.is_authenticated() {
            return;
        }

        let (token, cancel) = CancellationToken::new();
        self.tab_cancel = Some(token);
        self.tab_errors.remove(&self.current_tab);
        self.loading = true;

        let tx = self.fetch_tx.clone();
        match self.current_tab {
            Tab::Dashboard => {
                tokio::spawn(Self::fetch_dashboard(tx, self.coins.clone(), cancel));
            }
            Tab::Coin => match self.selected_coin.clone() {
                Some(id) => {
                    tokio::spawn(Self::fetch_coin(tx, self.coins.clone(), cancel, id));
                    self.refresh_chart();
                }
                None => self.loading = false,
            },
            Tab::Watchlist => {
                tokio::spawn(Self::fetch_watchlist(tx, self.coins.clone(), cancel));
            }
            Tab::Portfolio => {
                tokio::spawn(Self::fetch_portfolio(tx, self.coins.clone(), cancel));
            }
            Tab::Chat => {
                tokio::spawn(Self::fetch_chat(tx, self.chat.clone(), cancel));
            }
        }
    }

    /// Drop cached data for the current tab and fetch it again.
    pub fn retry_current_tab(&mut self) {
        let cache = self.coins.cache();
        match self.current_tab {
            Tab::Dashboard => self.coins.invalidate_market(),
            Tab::Coin => {
                if let Some(id) = self.selected_coin.as_deref() {
                    cache.invalidate_where(|key| key.concerns_coin(id));
                }
            }
            Tab::Watchlist => cache.invalidate(&QueryKey::Watchlist),
            Tab::Portfolio => cache.invalidate(&QueryKey::Portfolio),
            Tab::Chat => cache.invalidate(&QueryKey::ChatSessions),
        }
        self.status_message = Some(format!("Refreshing {}...", self.current_tab.title()));
        self.refresh_current_tab();
    }

    /// Refetch the chart for the selected coin and range.
    pub fn refresh_chart(&mut self) {
        let Some(id) = self.selected_coin.clone() else {
            return;
        };
        if let Some(token) = self.chart_cancel.take() {
            token.cancel();
        }
        let (token, cancel) = CancellationToken::new();
        self.chart_cancel = Some(token);

        tokio::spawn(Self::fetch_price_history(
            self.fetch_tx.clone(),
            self.coins.clone(),
            cancel,
            id,
            self.time_range,
        ));
    }

    pub fn set_time_range(&mut self, range: TimeRange) {
        if range != self.time_range {
            self.time_range = range;
            self.refresh_chart();
        }
    }

    /// Re-poll live market views once the poll interval has passed.
    pub fn poll_market(&mut self) {
        if self.last_poll.elapsed() < POLL_INTERVAL {
            return;
        }
        self.last_poll = Instant::now();

        if self.state == AppState::Normal
            && self.is_authenticated()
            && matches!(self.current_tab, Tab::Dashboard | Tab::Coin)
        {
            debug!(tab = self.current_tab.title(), "Polling market data");
            self.coins.invalidate_market();
            self.refresh_current_tab();
        }
    }

    async fn fetch_dashboard(
        tx: mpsc::Sender<FetchResult>,
        coins: CoinQueries,
        mut cancel: CancellationReceiver,
    ) {
        let work = async {
            Ok(tokio::join!(
                coins.top_coins(DEFAULT_TOP_COINS),
                coins.market_data(),
                coins.gainers_losers(),
                coins.trending(),
                coins.news(DEFAULT_NEWS_LIMIT),
            ))
        };

        match cancel.run_until_cancelled(work).await {
            Ok((top, market, movers, trending, news)) => {
                Self::send_result(&tx, FetchResult::TopCoins(top)).await;
                Self::send_fetch_result(&tx, Tab::Dashboard, "Market data", market, FetchResult::Market)
                    .await;
                Self::send_fetch_result_or_default(&tx, "Gainers and losers", movers, FetchResult::Movers)
                    .await;
                Self::send_fetch_result_or_default(&tx, "Trending", trending, FetchResult::Trending)
                    .await;
                Self::send_fetch_result_or_default(&tx, "News", news, FetchResult::News).await;
                Self::send_result(&tx, FetchResult::Done(Tab::Dashboard)).await;
            }
            Err(e) => debug!(error = %e, "Dashboard fetch abandoned"),
        }
    }

    async fn fetch_coin(
        tx: mpsc::Sender<FetchResult>,
        coins: CoinQueries,
        mut cancel: CancellationReceiver,
        id: String,
    ) {
        let work = async {
            Ok(tokio::join!(
                coins.coin_detail(&id),
                coins.coin(&id),
                coins.coin_news(&id, COIN_NEWS_LIMIT),
            ))
        };

        match cancel.run_until_cancelled(work).await {
            Ok((detail, quote, news)) => {
                Self::send_fetch_result(&tx, Tab::Coin, "Coin detail", detail, FetchResult::CoinDetail)
                    .await;
                match quote {
                    Ok(coin) => Self::send_result(&tx, FetchResult::Coin(coin)).await,
                    Err(e) => warn!(coin = %id, error = %e, "Coin quote fetch failed"),
                }
                let news = news.unwrap_or_else(|e| {
                    warn!(coin = %id, error = %e, "Coin news fetch failed");
                    Vec::new()
                });
                Self::send_result(&tx, FetchResult::CoinNews(id, news)).await;
                Self::send_result(&tx, FetchResult::Done(Tab::Coin)).await;
            }
            Err(e) => debug!(error = %e, "Coin fetch abandoned"),
        }
    }

    async fn fetch_price_history(
        tx: mpsc::Sender<FetchResult>,
        coins: CoinQueries,
        mut cancel: CancellationReceiver,
        id: String,
        range: TimeRange,
    ) {
        match cancel.run_until_cancelled(coins.price_history(&id, range)).await {
            Ok(history) => Self::send_result(&tx, FetchResult::PriceHistory(history)).await,
            Err(e) if e.is_cancelled() => debug!(coin = %id, "Price history fetch abandoned"),
            Err(e) => {
                error!(coin = %id, range = %range, error = %e, "Price history fetch failed");
                Self::send_result(
                    &tx,
                    FetchResult::Failed(Tab::Coin, format!("Price history: {}", e.message)),
                )
                .await;
            }
        }
    }

    /// Quotes for `ids` that are missing from `catalog`, fetched concurrently.
    async fn fetch_missing_quotes(coins: &CoinQueries, catalog: &mut Vec<Coin>, ids: Vec<String>) {
        let missing: Vec<String> = ids
            .into_iter()
            .filter(|id| !catalog.iter().any(|c| &c.id == id))
            .collect();
        if missing.is_empty() {
            return;
        }

        let quotes = join_all(missing.iter().map(|id| coins.coin(id))).await;
        for (id, quote) in missing.iter().zip(quotes) {
            match quote {
                Ok(coin) => catalog.push(coin),
                Err(e) => warn!(coin = %id, error = %e, "Quote fetch failed"),
            }
        }
    }

    async fn fetch_watchlist(
        tx: mpsc::Sender<FetchResult>,
        coins: CoinQueries,
        mut cancel: CancellationReceiver,
    ) {
        let work = async {
            let items = coins.watchlist().await?;
            let mut catalog = coins.top_coins(DEFAULT_TOP_COINS).await;
            let ids = items
                .iter()
                .filter_map(|item| match item {
                    WatchlistItem::Id(id) => Some(id.clone()),
                    WatchlistItem::Coin(_) => None,
                })
                .collect();
            Self::fetch_missing_quotes(&coins, &mut catalog, ids).await;
            Ok(resolve_watchlist(&items, &catalog))
        };

        match cancel.run_until_cancelled(work).await {
            Err(e) if e.is_cancelled() => debug!("Watchlist fetch abandoned"),
            result => {
                Self::send_fetch_result(&tx, Tab::Watchlist, "Watchlist", result, FetchResult::Watchlist)
                    .await;
                Self::send_result(&tx, FetchResult::Done(Tab::Watchlist)).await;
            }
        }
    }

    async fn fetch_portfolio(
        tx: mpsc::Sender<FetchResult>,
        coins: CoinQueries,
        mut cancel: CancellationReceiver,
    ) {
        let work = async {
            let entries = coins.portfolio().await?;
            let mut prices = coins.top_coins(DEFAULT_TOP_COINS).await;
            let ids = entries.iter().map(|e| e.coin_id.clone()).collect();
            Self::fetch_missing_quotes(&coins, &mut prices, ids).await;
            Ok((entries, prices))
        };

        match cancel.run_until_cancelled(work).await {
            Err(e) if e.is_cancelled() => debug!("Portfolio fetch abandoned"),
            result => {
                Self::send_fetch_result(&tx, Tab::Portfolio, "Portfolio", result, |(entries, prices)| {
                    FetchResult::Portfolio(entries, prices)
                })
                .await;
                Self::send_result(&tx, FetchResult::Done(Tab::Portfolio)).await;
            }
        }
    }

    async fn fetch_chat(
        tx: mpsc::Sender<FetchResult>,
        chat: ChatQueries,
        mut cancel: CancellationReceiver,
    ) {
        let work = async { Ok(tokio::join!(chat.sessions(), chat.suggestions())) };

        match cancel.run_until_cancelled(work).await {
            Ok((sessions, suggestions)) => {
                Self::send_fetch_result(&tx, Tab::Chat, "Chat sessions", sessions, FetchResult::ChatSessions)
                    .await;
                Self::send_fetch_result_or_default(
                    &tx,
                    "Chat suggestions",
                    suggestions,
                    FetchResult::ChatSuggestions,
                )
                .await;
                Self::send_result(&tx, FetchResult::Done(Tab::Chat)).await;
            }
            Err(e) => debug!(error = %e, "Chat fetch abandoned"),
        }
    }

    /// Helper to send a result to the UI loop
    async fn send_result(tx: &mpsc::Sender<FetchResult>, result: FetchResult) {
        if tx.send(result).await.is_err() {
            debug!("Fetch result receiver dropped");
        }
    }

    /// Helper to send a fetch result, reporting failure against `tab`
    async fn send_fetch_result<T, F>(
        tx: &mpsc::Sender<FetchResult>,
        tab: Tab,
        name: &str,
        result: ApiResult<T>,
        wrapper: F,
    ) where
        F: FnOnce(T) -> FetchResult,
    {
        match result {
            Ok(data) => {
                debug!("{} fetched successfully", name);
                Self::send_result(tx, wrapper(data)).await;
            }
            Err(e) => {
                error!(error = %e, "{} fetch failed", name);
                Self::send_result(tx, FetchResult::Failed(tab, format!("{}: {}", name, e.message)))
                    .await;
            }
        }
    }

    /// Helper to send a fetch result or a default value for secondary data
    async fn send_fetch_result_or_default<T, F>(
        tx: &mpsc::Sender<FetchResult>,
        name: &str,
        result: ApiResult<T>,
        wrapper: F,
    ) where
        T: Default,
        F: FnOnce(T) -> FetchResult,
    {
        let data = result.unwrap_or_else(|e| {
            warn!(error = %e, "{} fetch failed, using empty data", name);
            T::default()
        });
        Self::send_result(tx, wrapper(data)).await;
    }

    // ========================================================================
    // Search
    // ========================================================================

    pub fn start_search(&mut self) {
        self.state = AppState::Searching;
        self.search_query.clear();
        self.search_results.clear();
        self.search_selection = 0;
    }

    pub fn run_search(&mut self) {
        let query = self.search_query.trim().to_string();
        if query.is_empty() {
            return;
        }
        let tx = self.fetch_tx.clone();
        let coins = self.coins.clone();
        tokio::spawn(async move {
            match coins.search(&query).await {
                Ok(results) => Self::send_result(&tx, FetchResult::SearchResults(query, results)).await,
                Err(e) => {
                    error!(error = %e, "Search failed");
                    Self::send_result(&tx, FetchResult::MutationFailed(format!("Search failed: {}", e.message)))
                        .await;
                }
            }
        });
        self.status_message = Some("Searching...".to_string());
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    fn spawn_mutation<Fut>(&mut self, tab: Tab, success: String, failure: &'static str, fut: Fut)
    where
        Fut: std::future::Future<Output = ApiResult<()>> + Send + 'static,
    {
        let tx = self.fetch_tx.clone();
        tokio::spawn(async move {
            let result = match fut.await {
                Ok(()) => FetchResult::Mutated(tab, success),
                Err(e) => {
                    error!(error = %e, "{}", failure);
                    FetchResult::MutationFailed(format!("{}: {}", failure, e.message))
                }
            };
            Self::send_result(&tx, result).await;
        });
    }

    pub fn add_to_watchlist(&mut self, id: String) {
        let coins = self.coins.clone();
        let success = format!("Added {} to watchlist", id);
        self.spawn_mutation(Tab::Watchlist, success, "Failed to add to watchlist", async move {
            coins.add_to_watchlist(&id).await
        });
    }

    pub fn remove_selected_from_watchlist(&mut self) {
        let Some(coin) = self.watchlist.get(self.watchlist_selection) else {
            return;
        };
        let id = coin.id.clone();
        let coins = self.coins.clone();
        let success = format!("Removed {} from watchlist", id);
        self.spawn_mutation(Tab::Watchlist, success, "Failed to remove from watchlist", async move {
            coins.remove_from_watchlist(&id).await
        });
    }

    /// Open the portfolio form, editing the selected entry or adding a new one.
    pub fn start_portfolio_edit(&mut self, edit_selected: bool) {
        self.editing_entry = None;
        self.portfolio_input.clear();
        if edit_selected {
            match self.portfolio.get(self.portfolio_selection) {
                Some(entry) => {
                    self.editing_entry = Some(entry.id.clone());
                    self.portfolio_input = format!("{} {}", entry.amount, entry.price);
                }
                None => return,
            }
        }
        self.state = AppState::EditingPortfolio;
    }

    pub fn submit_portfolio_input(&mut self) {
        let parsed = parse_portfolio_input(&self.portfolio_input, self.editing_entry.is_none());
        let input = match parsed {
            Ok(input) => input,
            Err(message) => {
                self.status_message = Some(message);
                return;
            }
        };

        let PortfolioInput {
            coin_id,
            amount,
            price,
        } = input;
        let coins = self.coins.clone();
        match (self.editing_entry.take(), coin_id) {
            (Some(entry_id), _) => {
                self.spawn_mutation(
                    Tab::Portfolio,
                    "Portfolio entry updated".to_string(),
                    "Failed to update entry",
                    async move { coins.update_portfolio_entry(&entry_id, amount, price).await },
                );
            }
            (None, Some(coin_id)) => {
                let success = format!("Added {} to portfolio", coin_id);
                self.spawn_mutation(Tab::Portfolio, success, "Failed to add entry", async move {
                    coins.add_to_portfolio(&coin_id, amount, price).await
                });
            }
            (None, None) => return,
        }

        self.portfolio_input.clear();
        self.state = AppState::Normal;
    }

    pub fn remove_selected_portfolio_entry(&mut self) {
        let Some(entry) = self.portfolio.get(self.portfolio_selection) else {
            return;
        };
        let id = entry.id.clone();
        let coins = self.coins.clone();
        self.spawn_mutation(
            Tab::Portfolio,
            "Portfolio entry removed".to_string(),
            "Failed to remove entry",
            async move { coins.remove_from_portfolio(&id).await },
        );
    }

    // ========================================================================
    // Chat
    // ========================================================================

    /// Send the composed message. The user's message is shown immediately;
    /// a failure appends an error reply.
    pub fn send_chat_message(&mut self) {
        let text = self.chat_input.trim().to_string();
        if text.is_empty() || self.chat_pending {
            return;
        }

        self.chat_input.clear();
        self.chat_messages.push(ChatMessage::user(text.clone()));
        self.chat_pending = true;

        let request = ChatRequest {
            message: text,
            session_id: self.chat_session_id.clone(),
        };
        let tx = self.fetch_tx.clone();
        let chat = self.chat.clone();
        tokio::spawn(async move {
            let result = match chat.send_message(&request).await {
                Ok(response) => FetchResult::ChatReply(response),
                Err(e) => {
                    error!(error = %e, "Chat message failed");
                    FetchResult::ChatFailed(e.message)
                }
            };
            Self::send_result(&tx, result).await;
        });
    }

    /// Start a fresh conversation.
    pub fn new_chat(&mut self) {
        self.chat_session_id = None;
        self.chat_messages.clear();
        self.chat_pending = false;
    }

    pub fn open_selected_chat_session(&mut self) {
        let Some(session) = self.chat_sessions.get(self.chat_session_selection) else {
            return;
        };
        let id = session.id.clone();
        let tx = self.fetch_tx.clone();
        let chat = self.chat.clone();
        tokio::spawn(async move {
            let result = chat.session(&id).await;
            Self::send_fetch_result(&tx, Tab::Chat, "Chat session", result, FetchResult::ChatSession)
                .await;
        });
    }

    pub fn delete_selected_chat_session(&mut self) {
        let Some(session) = self.chat_sessions.get(self.chat_session_selection) else {
            return;
        };
        let id = session.id.clone();
        if self.chat_session_id.as_deref() == Some(id.as_str()) {
            self.new_chat();
        }
        let chat = self.chat.clone();
        self.spawn_mutation(
            Tab::Chat,
            "Conversation deleted".to_string(),
            "Failed to delete conversation",
            async move { chat.delete_session(&id).await },
        );
    }

    // ========================================================================
    // Result Processing
    // ========================================================================

    /// Check for completed background tasks and gateway notifications.
    pub async fn check_background_tasks(&mut self) {
        // Collect all pending results first to avoid borrow conflicts
        let results: Vec<FetchResult> = {
            if let Some(ref mut rx) = self.fetch_rx {
                let mut results = Vec::new();
                while let Ok(result) = rx.try_recv() {
                    results.push(result);
                }
                results
            } else {
                Vec::new()
            }
        };

        for result in results {
            self.process_fetch_result(result);
        }

        loop {
            match self.gateway_events.try_recv() {
                Ok(event) => self.handle_gateway_event(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Missed gateway events");
                }
                Err(_) => break,
            }
        }
    }

    fn process_fetch_result(&mut self, result: FetchResult) {
        match result {
            FetchResult::TopCoins(data) => {
                self.dashboard_selection = clamp_selection(self.dashboard_selection, data.len());
                self.top_coins = data;
            }
            FetchResult::Market(data) => self.market = Some(data),
            FetchResult::Movers(data) => self.movers = data,
            FetchResult::Trending(data) => self.trending = data,
            FetchResult::News(data) => self.news = data,
            FetchResult::Coin(coin) => {
                if self.selected_coin.as_deref() == Some(coin.id.as_str()) {
                    self.coin = Some(coin);
                }
            }
            FetchResult::CoinDetail(detail) => {
                if self.selected_coin.as_deref() == Some(detail.id.as_str()) {
                    self.coin_detail = Some(detail);
                }
            }
            FetchResult::PriceHistory(history) => {
                if self.selected_coin.as_deref() == Some(history.coin_id.as_str())
                    && history.range == self.time_range
                {
                    self.price_history = Some(history);
                }
            }
            FetchResult::CoinNews(id, articles) => {
                if self.selected_coin.as_deref() == Some(id.as_str()) {
                    self.coin_news = articles;
                }
            }
            FetchResult::Watchlist(data) => {
                self.watchlist_selection = clamp_selection(self.watchlist_selection, data.len());
                self.watchlist = data;
            }
            FetchResult::Portfolio(entries, prices) => {
                self.portfolio_selection = clamp_selection(self.portfolio_selection, entries.len());
                self.portfolio = entries;
                self.portfolio_prices = prices;
            }
            FetchResult::ChatSessions(sessions) => {
                self.chat_session_selection =
                    clamp_selection(self.chat_session_selection, sessions.len());
                self.chat_sessions = sessions;
            }
            FetchResult::ChatSession(session) => {
                self.chat_session_id = Some(session.id.clone());
                self.chat_messages = session.messages;
                self.chat_pending = false;
            }
            FetchResult::ChatSuggestions(suggestions) => self.chat_suggestions = suggestions,
            FetchResult::ChatReply(response) => {
                self.chat_pending = false;
                let started_session =
                    self.chat_session_id.is_none() && response.session_id.is_some();
                if response.session_id.is_some() {
                    self.chat_session_id = response.session_id;
                }
                self.chat_messages.push(response.message);
                if !response.suggestions.is_empty() {
                    self.chat_suggestions = response.suggestions;
                }
                if started_session && self.current_tab == Tab::Chat {
                    self.refresh_current_tab();
                }
            }
            FetchResult::ChatFailed(message) => {
                self.chat_pending = false;
                self.chat_messages.push(ChatMessage::send_failure());
                self.status_message = Some(format!("Message not sent: {}", message));
            }
            FetchResult::SearchResults(query, results) => {
                if self.state == AppState::Searching && self.search_query.trim() == query {
                    self.status_message = Some(format!("{} results for \"{}\"", results.len(), query));
                    self.search_results = results;
                    self.search_selection = 0;
                }
            }
            FetchResult::Mutated(tab, message) => {
                info!("{}", message);
                self.status_message = Some(message);
                if tab == self.current_tab {
                    self.refresh_current_tab();
                }
            }
            FetchResult::MutationFailed(message) => {
                self.status_message = Some(message);
            }
            FetchResult::Failed(tab, message) => {
                self.tab_errors.insert(tab, message);
                if tab == self.current_tab {
                    self.loading = false;
                }
            }
            FetchResult::Done(tab) => {
                if tab == self.current_tab {
                    self.loading = false;
                }
            }
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// User-facing message for a failed login or registration
pub fn login_error_message(error: &ApiError, mode: LoginMode) -> String {
    match (error.kind, mode) {
        (ErrorKind::Unauthorized, _) => "Invalid username or password".to_string(),
        (ErrorKind::Network, _) => {
            "Unable to connect to server. Check your internet connection.".to_string()
        }
        (ErrorKind::Validation, LoginMode::Register) => error.message.clone(),
        (_, LoginMode::Login) => format!("Login failed: {}", error.message),
        (_, LoginMode::Register) => format!("Registration failed: {}", error.message),
    }
}

/// Parse portfolio form input: `<coin> <amount> <price>` for a new entry,
/// `<amount> <price>` when editing.
pub fn parse_portfolio_input(input: &str, with_coin: bool) -> Result<PortfolioInput, String> {
    let parts: Vec<&str> = input.split_whitespace().collect();
    let expected = if with_coin { 3 } else { 2 };
    if parts.len() != expected {
        return Err(if with_coin {
            "Enter: <coin id> <amount> <price>".to_string()
        } else {
            "Enter: <amount> <price>".to_string()
        });
    }

    let (coin_id, numbers) = if with_coin {
        (Some(parts[0].to_lowercase()), &parts[1..])
    } else {
        (None, &parts[..])
    };

    let amount: f64 = numbers[0]
        .parse()
        .map_err(|_| format!("Invalid amount: {}", numbers[0]))?;
    let price: f64 = numbers[1]
        .parse()
        .map_err(|_| format!("Invalid price: {}", numbers[1]))?;

    if !amount.is_finite() || amount <= 0.0 {
        return Err("Amount must be greater than zero".to_string());
    }
    if !price.is_finite() || price < 0.0 {
        return Err("Price cannot be negative".to_string());
    }

    Ok(PortfolioInput {
        coin_id,
        amount,
        price,
    })
}

fn step_selection(current: usize, delta: isize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let next = current as isize + delta;
    next.clamp(0, len as isize - 1) as usize
}

fn clamp_selection(current: usize, len: usize) -> usize {
    current.min(len.saturating_sub(1))
}

// ============================================================================
// Input Validation
// ============================================================================

/// Check if a character is valid for input (no control characters)
fn is_valid_input_char(c: char) -> bool {
    !c.is_control()
}

/// Check if a username character should be accepted
pub fn can_add_username_char(current_len: usize, c: char) -> bool {
    current_len < MAX_USERNAME_LENGTH && is_valid_input_char(c)
}

/// Check if an email character should be accepted
pub fn can_add_email_char(current_len: usize, c: char) -> bool {
    current_len < MAX_EMAIL_LENGTH && is_valid_input_char(c) && !c.is_whitespace()
}

/// Check if a password character should be accepted
pub fn can_add_password_char(current_len: usize, c: char) -> bool {
    current_len < MAX_PASSWORD_LENGTH && is_valid_input_char(c)
}

pub fn can_add_chat_char(current_len: usize, c: char) -> bool {
    current_len < MAX_CHAT_INPUT_LENGTH && is_valid_input_char(c)
}

pub fn can_add_search_char(current_len: usize, c: char) -> bool {
    current_len < MAX_SEARCH_LENGTH && is_valid_input_char(c)
}

pub fn can_add_portfolio_char(current_len: usize, c: char) -> bool {
    current_len < MAX_PORTFOLIO_INPUT_LENGTH && (c.is_ascii_alphanumeric() || matches!(c, ' ' | '.' | '-'))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use coindash_core::auth::MemoryStore;
    use coindash_core::models::ChatRole;

    fn test_app() -> App {
        let config = Config {
            api_base_url: "http://127.0.0.1:9".to_string(),
            ..Config::default()
        };
        App::with_store(config, Arc::new(MemoryStore::new())).unwrap()
    }

    fn coin(id: &str) -> Coin {
        serde_json::from_value(serde_json::json!({"id": id, "symbol": id, "name": id})).unwrap()
    }

    // -------------------------------------------------------------------------
    // Tab Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_tab_cycle() {
        for tab in Tab::ALL {
            assert_eq!(tab.next().prev(), tab);
        }
        assert_eq!(Tab::Chat.next(), Tab::Dashboard);
        assert_eq!(Tab::Dashboard.prev(), Tab::Chat);
    }

    #[test]
    fn test_login_focus_skips_email_when_logging_in() {
        assert_eq!(LoginFocus::Username.next(LoginMode::Login), LoginFocus::Password);
        assert_eq!(LoginFocus::Username.next(LoginMode::Register), LoginFocus::Email);
        assert_eq!(LoginFocus::Password.prev(LoginMode::Login), LoginFocus::Username);
        assert_eq!(LoginFocus::Password.prev(LoginMode::Register), LoginFocus::Email);
        assert_eq!(LoginFocus::SwitchMode.next(LoginMode::Login), LoginFocus::Username);
    }

    // -------------------------------------------------------------------------
    // Input Validation Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_username_char_limits() {
        assert!(can_add_username_char(0, 'a'));
        assert!(can_add_username_char(49, 'z'));
        assert!(!can_add_username_char(50, 'a'));
        assert!(!can_add_username_char(0, '\n'));
    }

    #[test]
    fn test_password_char_limits() {
        assert!(can_add_password_char(0, '!'));
        assert!(can_add_password_char(127, ' '));
        assert!(!can_add_password_char(128, 'a'));
        assert!(!can_add_password_char(3, '\t'));
    }

    #[test]
    fn test_email_rejects_whitespace() {
        assert!(can_add_email_char(0, '@'));
        assert!(!can_add_email_char(0, ' '));
        assert!(!can_add_email_char(254, 'a'));
    }

    #[test]
    fn test_portfolio_chars() {
        assert!(can_add_portfolio_char(0, '0'));
        assert!(can_add_portfolio_char(0, '.'));
        assert!(can_add_portfolio_char(0, '-'));
        assert!(!can_add_portfolio_char(0, '$'));
        assert!(!can_add_portfolio_char(64, '1'));
    }

    // -------------------------------------------------------------------------
    // Portfolio Input Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_new_portfolio_entry() {
        let input = parse_portfolio_input("Bitcoin 0.5 42000", true).unwrap();
        assert_eq!(
            input,
            PortfolioInput {
                coin_id: Some("bitcoin".to_string()),
                amount: 0.5,
                price: 42000.0,
            }
        );
    }

    #[test]
    fn test_parse_portfolio_edit() {
        let input = parse_portfolio_input("  2   1800.25 ", false).unwrap();
        assert_eq!(input.coin_id, None);
        assert_eq!(input.amount, 2.0);
        assert_eq!(input.price, 1800.25);
    }

    #[test]
    fn test_parse_portfolio_rejects_bad_input() {
        assert!(parse_portfolio_input("bitcoin 0.5", true).is_err());
        assert!(parse_portfolio_input("0.5 100 extra", false).is_err());
        assert!(parse_portfolio_input("abc 100", false).is_err());
        assert!(parse_portfolio_input("0 100", false).is_err());
        assert!(parse_portfolio_input("1 -5", false).is_err());
        assert!(parse_portfolio_input("NaN 5", false).is_err());
        assert!(parse_portfolio_input("1 0", false).is_ok());
    }

    // -------------------------------------------------------------------------
    // Selection Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_step_selection_clamps() {
        assert_eq!(step_selection(0, -1, 5), 0);
        assert_eq!(step_selection(4, 1, 5), 4);
        assert_eq!(step_selection(2, 10, 5), 4);
        assert_eq!(step_selection(3, 1, 0), 0);
        assert_eq!(clamp_selection(7, 3), 2);
        assert_eq!(clamp_selection(1, 0), 0);
    }

    // -------------------------------------------------------------------------
    // Login Message Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_login_error_messages() {
        let unauthorized = ApiError {
            kind: ErrorKind::Unauthorized,
            status: Some(401),
            ..ApiError::unknown("bad")
        };
        assert_eq!(
            login_error_message(&unauthorized, LoginMode::Login),
            "Invalid username or password"
        );

        assert_eq!(
            login_error_message(&ApiError::network(), LoginMode::Login),
            "Unable to connect to server. Check your internet connection."
        );

        let taken = ApiError {
            kind: ErrorKind::Validation,
            status: Some(400),
            ..ApiError::unknown("Username taken")
        };
        assert_eq!(login_error_message(&taken, LoginMode::Register), "Username taken");
        assert_eq!(
            login_error_message(&taken, LoginMode::Login),
            "Login failed: Username taken"
        );
    }

    // -------------------------------------------------------------------------
    // App State Tests
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_session_expiry_shows_login() {
        let mut app = test_app();
        app.chat_messages.push(ChatMessage::user("hi"));

        app.handle_gateway_event(GatewayEvent::SessionExpired);
        assert_eq!(app.state, AppState::LoggingIn);
        assert!(app.login_error.is_some());
        assert!(app.chat_messages.is_empty());

        // Already on the login view: nothing changes
        app.login_error = None;
        app.handle_gateway_event(GatewayEvent::SessionExpired);
        assert_eq!(app.state, AppState::LoggingIn);
        assert!(app.login_error.is_none());
    }

    #[tokio::test]
    async fn test_tab_switch_cancels_previous_fetch() {
        let mut app = test_app();
        let (token, _rx) = CancellationToken::new();
        app.tab_cancel = Some(token.clone());
        app.switch_tab(Tab::Watchlist);
        assert!(token.is_cancelled());
        assert_eq!(app.current_tab, Tab::Watchlist);
    }

    #[tokio::test]
    async fn test_failed_fetch_sets_tab_error() {
        let mut app = test_app();
        app.loading = true;
        app.process_fetch_result(FetchResult::Failed(Tab::Dashboard, "Market data: boom".into()));
        assert_eq!(app.tab_errors.get(&Tab::Dashboard).unwrap(), "Market data: boom");
        assert!(!app.loading);

        // Errors for other tabs leave the loading flag alone
        app.loading = true;
        app.process_fetch_result(FetchResult::Failed(Tab::Chat, "x".into()));
        assert!(app.loading);
    }

    #[tokio::test]
    async fn test_stale_coin_results_ignored() {
        let mut app = test_app();
        app.selected_coin = Some("ethereum".to_string());

        app.process_fetch_result(FetchResult::Coin(coin("bitcoin")));
        assert!(app.coin.is_none());

        app.process_fetch_result(FetchResult::Coin(coin("ethereum")));
        assert_eq!(app.coin.as_ref().unwrap().id, "ethereum");

        app.process_fetch_result(FetchResult::PriceHistory(PriceHistory {
            coin_id: "ethereum".to_string(),
            range: TimeRange::Year,
            points: Vec::new(),
        }));
        assert!(app.price_history.is_none());
    }

    #[tokio::test]
    async fn test_chat_failure_appends_error_reply() {
        let mut app = test_app();
        app.chat_input = "price of btc?".to_string();
        app.send_chat_message();
        assert!(app.chat_pending);
        assert!(app.chat_input.is_empty());
        assert_eq!(app.chat_messages.len(), 1);
        assert_eq!(app.chat_messages[0].role, ChatRole::User);

        // A second send while pending is ignored
        app.chat_input = "again".to_string();
        app.send_chat_message();
        assert_eq!(app.chat_messages.len(), 1);

        app.process_fetch_result(FetchResult::ChatFailed("offline".into()));
        assert!(!app.chat_pending);
        assert_eq!(app.chat_messages.len(), 2);
        assert!(app.chat_messages[1].is_error());
    }

    #[tokio::test]
    async fn test_theme_toggle_persists() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut app = App::with_store(Config::default(), Arc::clone(&store)).unwrap();
        assert_eq!(app.theme, Theme::System);

        app.toggle_theme();
        assert_eq!(app.theme, Theme::Light);
        assert_eq!(Theme::load(store.as_ref()), Theme::Light);
    }

    #[tokio::test]
    async fn test_results_clamp_selection() {
        let mut app = test_app();
        app.watchlist_selection = 5;
        app.process_fetch_result(FetchResult::Watchlist(vec![coin("a"), coin("b")]));
        assert_eq!(app.watchlist_selection, 1);

        app.current_tab = Tab::Watchlist;
        app.move_selection(-1);
        assert_eq!(app.watchlist_selection, 0);
        assert_eq!(app.highlighted_coin_id().as_deref(), Some("a"));
    }
}

//! Exchange operations
//!
//! Users, lots and pairs, order placement with fund locking and matching,
//! cancellation and the read-side listings. Every operation is a sequence
//! of query engine calls plus the ledger and order mutators. Nothing is
//! rolled back: a debit applied before a failing step stays applied.

use common::{generate_user_key, unix_timestamp, Side, EPSILON};
use config::{ExchangeSettings, SchemaConfig};
use observability::ExchangeMetrics;
use storage::{Condition, Database};
use tracing::{debug, error, info, instrument, warn};

use crate::domain::{Balance, Lot, NewOrder, Order, OrderRecord, Pair, User};
use crate::error::ExchangeError;
use crate::matching;
use crate::result::{Fill, Placement};
use crate::store::{select_rows, Ledger, OrderStore};
use crate::Result;

/// The exchange over one database
///
/// Methods take `&self`; callers serving concurrent requests must
/// serialize them (the HTTP layer holds one process-wide mutex).
pub struct Exchange {
    db: Database,
    /// Amount of every lot granted to a new user
    seed_balance: f64,
    metrics: ExchangeMetrics,
}

impl Exchange {
    pub fn new(db: Database, seed_balance: f64) -> Self {
        Self {
            db,
            seed_balance,
            metrics: ExchangeMetrics::new(),
        }
    }

    /// Open (creating where missing) the database under
    /// `settings.data_dir`
    pub fn open(settings: &ExchangeSettings, schema: &SchemaConfig) -> Result<Self> {
        let db = Database::open(&settings.data_dir, schema)?;
        Ok(Self::new(db, settings.seed_balance))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn ledger(&self) -> Ledger<'_> {
        Ledger::new(&self.db)
    }

    pub fn orders(&self) -> OrderStore<'_> {
        OrderStore::new(&self.db)
    }

    fn observe<T>(&self, operation: &'static str, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            self.metrics.rejected(err.reason());
            if err.is_client_error() {
                warn!(operation, error = %err, "Request rejected");
            } else {
                error!(operation, error = %err, "Request failed");
            }
        }
        result
    }

    // ------------------------------------------------------------------------
    // Setup & users
    // ------------------------------------------------------------------------

    /// Insert the configured lots and one pair per lot combination, unless
    /// lots already exist. Returns whether anything was inserted.
    #[instrument(skip_all, fields(lots = lots.len()))]
    pub fn bootstrap<S: AsRef<str>>(&self, lots: &[S]) -> Result<bool> {
        if !select_rows(&self.db, "lot", &[])?.is_empty() {
            debug!("Lots present, bootstrap skipped");
            return Ok(false);
        }

        let mut ids = Vec::with_capacity(lots.len());
        for name in lots {
            ids.push(self.db.insert("lot", &[name.as_ref().to_string()])?);
        }

        let mut pairs = 0;
        for (i, first) in ids.iter().enumerate() {
            for second in &ids[i + 1..] {
                self.db
                    .insert("pair", &[first.to_string(), second.to_string()])?;
                pairs += 1;
            }
        }

        info!(lots = ids.len(), pairs, "Exchange bootstrapped");
        Ok(true)
    }

    /// Register a user and grant the seed balance of every lot. Returns
    /// the user's key.
    #[instrument(skip(self))]
    pub fn create_user(&self, username: &str) -> Result<String> {
        self.observe("create_user", self.register(username))
    }

    fn register(&self, username: &str) -> Result<String> {
        let username = username.trim();
        if username.is_empty() {
            return Err(ExchangeError::validation("username is required"));
        }

        let key = generate_user_key();
        let user_id = self.db.insert("user", &[username.to_string(), key.clone()])?;

        if self.seed_balance > EPSILON {
            let ledger = self.ledger();
            for lot in self.lots()? {
                ledger.open_account(user_id, lot.id, self.seed_balance)?;
            }
        }

        self.metrics.user_created();
        info!(user_id, username, "User created");
        Ok(key)
    }

    /// Resolve a user key. Empty and unknown keys are
    /// [`ExchangeError::Unauthorized`].
    pub fn authenticate(&self, key: &str) -> Result<User> {
        let key = key.trim();
        if key.is_empty() {
            return Err(ExchangeError::unauthorized("missing user key"));
        }

        let rows = select_rows(&self.db, "user", &[Condition::eq("user.key", key)])?;
        match rows.first() {
            Some(row) => User::from_row(row),
            None => Err(ExchangeError::unauthorized("unknown user key")),
        }
    }

    // ------------------------------------------------------------------------
    // Listings
    // ------------------------------------------------------------------------

    pub fn lots(&self) -> Result<Vec<Lot>> {
        select_rows(&self.db, "lot", &[])?
            .iter()
            .map(|row| Lot::from_row(row))
            .collect()
    }

    pub fn pairs(&self) -> Result<Vec<Pair>> {
        select_rows(&self.db, "pair", &[])?
            .iter()
            .map(|row| Pair::from_row(row))
            .collect()
    }

    pub fn find_pair(&self, pair_id: u64) -> Result<Option<Pair>> {
        select_rows(
            &self.db,
            "pair",
            &[Condition::eq("pair.pair_id", pair_id.to_string())],
        )?
        .first()
        .map(|row| Pair::from_row(row))
        .transpose()
    }

    /// Pair by key; an unknown pair is a validation failure of the request
    pub fn pair(&self, pair_id: u64) -> Result<Pair> {
        self.find_pair(pair_id)?
            .ok_or_else(|| ExchangeError::validation(format!("unknown pair {}", pair_id)))
    }

    /// Every order, open and closed
    pub fn all_orders(&self) -> Result<Vec<Order>> {
        self.observe("get_orders", self.orders().all())
    }

    /// Balances of the user owning `key`
    pub fn balance(&self, key: &str) -> Result<Vec<Balance>> {
        let result = self
            .authenticate(key)
            .and_then(|user| self.ledger().balances(user.id));
        self.observe("get_balance", result)
    }

    // ------------------------------------------------------------------------
    // Orders
    // ------------------------------------------------------------------------

    /// Lock funds for `order`, match it against resting orders and record
    /// the result.
    #[instrument(skip(self, key), fields(pair_id = order.pair_id, side = %order.side))]
    pub fn create_order(&self, key: &str, order: &NewOrder) -> Result<Placement> {
        self.observe("create_order", self.place(key, order))
    }

    fn place(&self, key: &str, order: &NewOrder) -> Result<Placement> {
        let user = self.authenticate(key)?;

        if !(order.quantity > 0.0 && order.quantity.is_finite()) {
            return Err(ExchangeError::validation("quantity must be positive"));
        }
        if !(order.price > 0.0 && order.price.is_finite()) {
            return Err(ExchangeError::validation("price must be positive"));
        }

        let pair = self.pair(order.pair_id)?;
        let ledger = self.ledger();
        let orders = self.orders();

        let lock_lot = match order.side {
            Side::Buy => pair.currency(),
            Side::Sell => pair.asset(),
        };
        let locked = order.lock_amount();
        let available = ledger.balance(user.id, lock_lot)?;
        if available < locked {
            return Err(ExchangeError::InsufficientFunds {
                requested: locked,
                available,
            });
        }
        ledger.adjust(user.id, lock_lot, -locked)?;

        let resting = orders.open_on_pair(pair.id, order.side.opposite())?;
        let candidates = matching::candidates(order.side, order.price, user.id, resting);

        let mut remaining = order.quantity;
        let mut fills = Vec::new();

        for resting in candidates {
            if remaining <= EPSILON {
                break;
            }

            let price = matching::execution_price(order.side, order.price, resting.price);
            let quantity = remaining.min(resting.quantity);
            let value = quantity * price;

            match order.side {
                Side::Buy => {
                    ledger.adjust(user.id, pair.asset(), quantity)?;
                    ledger.adjust(resting.user_id, pair.currency(), value)?;
                }
                Side::Sell => {
                    ledger.adjust(user.id, pair.currency(), value)?;
                    ledger.adjust(resting.user_id, pair.asset(), quantity)?;
                    // the resting buyer locked at its own, higher limit
                    let improvement = quantity * (resting.price - price);
                    if improvement > EPSILON {
                        ledger.adjust(resting.user_id, pair.currency(), improvement)?;
                    }
                }
            }

            let timestamp = unix_timestamp();
            let left = resting.quantity - quantity;
            if left <= EPSILON {
                orders.close(resting.id, &timestamp)?;
            } else {
                orders.set_quantity(resting.id, left)?;
                orders.insert(&OrderRecord::settled(
                    resting.user_id,
                    pair.id,
                    resting.side,
                    quantity,
                    price,
                    &timestamp,
                ))?;
            }

            self.metrics.trade_executed();
            debug!(
                resting_order_id = resting.id,
                counterparty_id = resting.user_id,
                quantity,
                price,
                "Trade executed"
            );

            fills.push(Fill {
                resting_order_id: resting.id,
                counterparty_id: resting.user_id,
                quantity,
                price,
            });
            remaining -= quantity;
        }

        let open_quantity = if remaining > EPSILON { remaining } else { 0.0 };
        let mut placement = Placement {
            order_id: 0,
            fills,
            remaining: open_quantity,
        };

        if order.side.is_buy() && placement.has_trades() {
            let refund = locked - placement.filled_value() - open_quantity * order.price;
            if refund > EPSILON {
                ledger.adjust(user.id, pair.currency(), refund)?;
            }
        }

        placement.order_id = match placement.average_price() {
            Some(average) => {
                let settled_id = orders.insert(&OrderRecord::settled(
                    user.id,
                    pair.id,
                    order.side,
                    placement.filled_quantity(),
                    average,
                    &unix_timestamp(),
                ))?;
                if open_quantity > 0.0 {
                    orders.insert(&OrderRecord::open(
                        user.id,
                        pair.id,
                        order.side,
                        open_quantity,
                        order.price,
                    ))?
                } else {
                    settled_id
                }
            }
            None => orders.insert(&OrderRecord::open(
                user.id,
                pair.id,
                order.side,
                order.quantity,
                order.price,
            ))?,
        };

        self.metrics.order_accepted(order.side.as_str());
        info!(
            order_id = placement.order_id,
            user_id = user.id,
            fills = placement.fills.len(),
            filled = placement.filled_quantity(),
            remaining = placement.remaining,
            "Order placed"
        );
        Ok(placement)
    }

    /// Cancel an open order of the caller: release its locked funds, then
    /// close it. Returns the order key.
    #[instrument(skip(self, key))]
    pub fn delete_order(&self, key: &str, order_id: u64) -> Result<u64> {
        self.observe("delete_order", self.cancel(key, order_id))
    }

    fn cancel(&self, key: &str, order_id: u64) -> Result<u64> {
        let user = self.authenticate(key)?;

        let order = match self.orders().find(order_id)? {
            Some(order) if order.user_id == user.id && order.is_open() => order,
            _ => {
                return Err(ExchangeError::forbidden(format!(
                    "order {} cannot be canceled",
                    order_id
                )))
            }
        };

        match self.find_pair(order.pair_id)? {
            Some(pair) => {
                self.ledger()
                    .adjust(user.id, order.locked_lot(&pair), order.locked_amount())?;
            }
            None => warn!(order_id, pair_id = order.pair_id, "Order on unknown pair, nothing unlocked"),
        }

        self.orders().close(order.id, &unix_timestamp())?;
        info!(order_id, user_id = user.id, "Order canceled");
        Ok(order.id)
    }
}

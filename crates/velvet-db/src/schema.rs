//! SQL schema definitions.

/// Complete schema for Velvet v1 database.
pub const SCHEMA_V1: &str = r#"
-- ============================================================
-- NFTs & Sales
-- ============================================================

CREATE TABLE IF NOT EXISTS nfts (
    token_id INTEGER PRIMARY KEY CHECK (token_id > 0),
    owner TEXT NOT NULL,
    hostess_index INTEGER NOT NULL CHECK (hostess_index BETWEEN 0 AND 7),
    mint_price_wei TEXT NOT NULL DEFAULT '0',
    mint_tx_hash TEXT,
    affiliate_tier1 TEXT,
    affiliate_tier2 TEXT,
    last_owner_sync INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_nfts_owner ON nfts(owner);
CREATE INDEX IF NOT EXISTS idx_nfts_tier ON nfts(hostess_index);

CREATE TABLE IF NOT EXISTS sale_records (
    tx_hash TEXT PRIMARY KEY,
    token_id INTEGER NOT NULL REFERENCES nfts(token_id),
    buyer TEXT NOT NULL,
    price_wei TEXT NOT NULL,
    hostess_index INTEGER NOT NULL,
    timestamp INTEGER NOT NULL,
    synthetic INTEGER NOT NULL DEFAULT 0
);

-- At most one real (non-synthetic) sale per token.
CREATE UNIQUE INDEX IF NOT EXISTS idx_sales_real_token
    ON sale_records(token_id) WHERE synthetic = 0;

CREATE TABLE IF NOT EXISTS affiliate_earnings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    beneficiary TEXT NOT NULL,
    token_id INTEGER NOT NULL,
    level INTEGER NOT NULL CHECK (level IN (1, 2)),
    amount_wei TEXT NOT NULL,
    tx_hash TEXT NOT NULL,
    timestamp INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_affiliate_beneficiary
    ON affiliate_earnings(beneficiary);

CREATE TABLE IF NOT EXISTS pending_mints (
    request_id INTEGER PRIMARY KEY,
    sender TEXT NOT NULL,
    token_id INTEGER NOT NULL,
    price_wei TEXT NOT NULL,
    tx_hash TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_pending_created ON pending_mints(created_at);

-- ============================================================
-- Reward ledger (rewards chain)
-- ============================================================

CREATE TABLE IF NOT EXISTS reward_events (
    tx_hash TEXT PRIMARY KEY,
    commitment_hash TEXT NOT NULL,
    amount_wei TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    block_number INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_reward_events_time ON reward_events(timestamp);

CREATE TABLE IF NOT EXISTS reward_withdrawals (
    tx_hash TEXT PRIMARY KEY,
    user_address TEXT NOT NULL,
    amount_wei TEXT NOT NULL,
    token_ids TEXT NOT NULL,
    timestamp INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_withdrawals_user
    ON reward_withdrawals(user_address);

-- ============================================================
-- Derived caches (recomputed each sync pass, never authoritative)
-- ============================================================

CREATE TABLE IF NOT EXISTS earnings_snapshots (
    token_id INTEGER PRIMARY KEY REFERENCES nfts(token_id),
    total_earned_wei TEXT NOT NULL DEFAULT '0',
    pending_wei TEXT NOT NULL DEFAULT '0',
    last24h_wei TEXT NOT NULL DEFAULT '0',
    apy_basis_points INTEGER NOT NULL DEFAULT 0,
    last_synced INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS global_stats (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    total_rewards_wei TEXT NOT NULL DEFAULT '0',
    rewards_24h_wei TEXT NOT NULL DEFAULT '0',
    total_nfts INTEGER NOT NULL DEFAULT 0,
    total_sales_wei TEXT NOT NULL DEFAULT '0',
    updated_at INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS tier_stats (
    hostess_index INTEGER PRIMARY KEY CHECK (hostess_index BETWEEN 0 AND 7),
    nft_count INTEGER NOT NULL DEFAULT 0,
    rewards_24h_wei TEXT NOT NULL DEFAULT '0',
    total_earned_wei TEXT NOT NULL DEFAULT '0',
    updated_at INTEGER NOT NULL DEFAULT 0
);

-- ============================================================
-- Time rewards (special token range)
-- ============================================================

CREATE TABLE IF NOT EXISTS time_reward_states (
    token_id INTEGER PRIMARY KEY,
    hostess_index INTEGER NOT NULL CHECK (hostess_index BETWEEN 0 AND 7),
    owner TEXT NOT NULL,
    start_time INTEGER NOT NULL,
    last_claim_time INTEGER NOT NULL,
    total_claimed_wei TEXT NOT NULL DEFAULT '0'
);

-- ============================================================
-- Listener cursors (survive restarts)
-- ============================================================

CREATE TABLE IF NOT EXISTS sync_cursors (
    name TEXT PRIMARY KEY,
    value INTEGER NOT NULL
);
"#;

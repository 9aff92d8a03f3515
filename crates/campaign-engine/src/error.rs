use thiserror::Error;

/// Campaign engine errors
#[derive(Error, Debug)]
pub enum DialerError {
    /// The campaign definition source is missing or has no campaign section
    #[error("Campaign definitions unavailable: {0}")]
    ConfigNotFound(String),

    /// The requested name has no matching campaign definition
    #[error("Campaign not found: {0}")]
    CampaignNotFound(String),

    /// A required campaign parameter is absent
    #[error("Incomplete campaign definition: {0}")]
    IncompleteConfig(String),

    /// A campaign parameter is present but out of range or unusable
    #[error("Invalid campaign definition: {0}")]
    InvalidConfig(String),

    /// Destination store errors (schema, claim, update)
    #[error("Destination store error: {0}")]
    Store(String),

    /// The telephony collaborator refused a dial request synchronously
    #[error("Origination rejected: {0}")]
    OriginationRejected(String),

    /// A campaign with this name already occupies a slot
    #[error("Campaign already running: {0}")]
    AlreadyRunning(String),

    /// Every registry slot is occupied
    #[error("Campaign capacity exceeded: all {0} slots in use")]
    CapacityExceeded(usize),

    /// No occupied slot with this name
    #[error("No campaign named: {0}")]
    NotFound(String),

    /// The operation requires a stopped campaign
    #[error("Campaign is running: {0}")]
    Running(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DialerError {
    /// Create a new ConfigNotFound error
    pub fn config_not_found<S: Into<String>>(msg: S) -> Self {
        Self::ConfigNotFound(msg.into())
    }

    /// Create a new CampaignNotFound error
    pub fn campaign_not_found<S: Into<String>>(msg: S) -> Self {
        Self::CampaignNotFound(msg.into())
    }

    /// Create a new IncompleteConfig error
    pub fn incomplete_config<S: Into<String>>(msg: S) -> Self {
        Self::IncompleteConfig(msg.into())
    }

    /// Create a new InvalidConfig error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new Store error
    pub fn store<S: Into<String>>(msg: S) -> Self {
        Self::Store(msg.into())
    }

    /// Create a new OriginationRejected error
    pub fn origination_rejected<S: Into<String>>(msg: S) -> Self {
        Self::OriginationRejected(msg.into())
    }

    /// Create a new NotFound error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new Internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<sqlx::Error> for DialerError {
    fn from(e: sqlx::Error) -> Self {
        Self::Store(e.to_string())
    }
}

impl From<serde_json::Error> for DialerError {
    fn from(e: serde_json::Error) -> Self {
        Self::IncompleteConfig(e.to_string())
    }
}

/// Result type for campaign engine operations
pub type Result<T> = std::result::Result<T, DialerError>;

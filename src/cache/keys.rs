//! Type-safe cache key builders

use std::fmt;

pub const VERSION: &str = "v1";

pub mod payment {
    use super::*;

    pub const NAMESPACE: &str = "payment";

    #[derive(Debug, Clone)]
    pub struct DetailKey {
        pub payment_id: String,
    }

    impl DetailKey {
        pub fn new(payment_id: impl Into<String>) -> Self {
            Self {
                payment_id: payment_id.into(),
            }
        }
    }

    impl fmt::Display for DetailKey {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}:{}:detail:{}", VERSION, NAMESPACE, self.payment_id)
        }
    }
}

pub mod order {
    use super::*;

    pub const NAMESPACE: &str = "order";

    #[derive(Debug, Clone)]
    pub struct PaymentsKey {
        pub order_id: String,
    }

    impl PaymentsKey {
        pub fn new(order_id: impl Into<String>) -> Self {
            Self {
                order_id: order_id.into(),
            }
        }
    }

    impl fmt::Display for PaymentsKey {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}:{}:payments:{}", VERSION, NAMESPACE, self.order_id)
        }
    }
}

pub mod user {
    use super::*;

    pub const NAMESPACE: &str = "user";

    #[derive(Debug, Clone)]
    pub struct PaymentsKey {
        pub user_id: String,
        pub page: i64,
        pub limit: i64,
    }

    impl PaymentsKey {
        pub fn new(user_id: impl Into<String>, page: i64, limit: i64) -> Self {
            Self {
                user_id: user_id.into(),
                page,
                limit,
            }
        }
    }

    impl fmt::Display for PaymentsKey {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(
                f,
                "{}:{}:payments:{}:{}:{}",
                VERSION, NAMESPACE, self.user_id, self.page, self.limit
            )
        }
    }
}

pub mod transaction {
    use super::*;

    pub const NAMESPACE: &str = "transaction";

    #[derive(Debug, Clone)]
    pub struct StatusKey {
        pub tx_hash: String,
    }

    impl StatusKey {
        pub fn new(tx_hash: impl Into<String>) -> Self {
            Self {
                tx_hash: tx_hash.into(),
            }
        }
    }

    impl fmt::Display for StatusKey {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}:{}:status:{}", VERSION, NAMESPACE, self.tx_hash)
        }
    }
}

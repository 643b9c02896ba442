//! Dependency health checks

use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Instant;

use crate::cache::RedisPool;
use crate::chains::evm::EvmNode;

#[derive(Debug, Clone, Serialize)]
pub struct DependencyHealth {
    pub name: &'static str,
    pub healthy: bool,
    pub response_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub checks: Vec<DependencyHealth>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

pub struct HealthChecker {
    db_pool: PgPool,
    redis_pool: RedisPool,
    node: Arc<dyn EvmNode>,
}

impl HealthChecker {
    pub fn new(db_pool: PgPool, redis_pool: RedisPool, node: Arc<dyn EvmNode>) -> Self {
        Self {
            db_pool,
            redis_pool,
            node,
        }
    }

    pub async fn check(&self) -> HealthStatus {
        let mut checks = Vec::with_capacity(3);

        let started = Instant::now();
        let db = crate::database::health_check(&self.db_pool).await;
        checks.push(DependencyHealth {
            name: "postgres",
            healthy: db.is_ok(),
            response_time_ms: started.elapsed().as_millis() as u64,
            error: db.err().map(|e| e.to_string()),
        });

        let started = Instant::now();
        let redis = crate::cache::health_check(&self.redis_pool).await;
        checks.push(DependencyHealth {
            name: "redis",
            healthy: redis.is_ok(),
            response_time_ms: started.elapsed().as_millis() as u64,
            error: redis.err().map(|e| e.to_string()),
        });

        let started = Instant::now();
        let node = self.node.block_number().await;
        checks.push(DependencyHealth {
            name: "chain_node",
            healthy: node.is_ok(),
            response_time_ms: started.elapsed().as_millis() as u64,
            error: node.err().map(|e| e.to_string()),
        });

        // Redis is best-effort and never gates overall health.
        let critical_ok = checks
            .iter()
            .filter(|c| c.name != "redis")
            .all(|c| c.healthy);

        HealthStatus {
            status: if critical_ok { "healthy" } else { "unhealthy" },
            checks,
        }
    }
}

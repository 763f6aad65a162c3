// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::{describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{info, warn};

/// 安装 Prometheus 导出器并注册指标描述
///
/// 地址无效或端口被占用时只记录警告，服务照常启动
pub fn init_metrics(listen_addr: &str) {
    let addr: SocketAddr = match listen_addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            warn!("Invalid metrics address {}: {}", listen_addr, e);
            return;
        }
    };

    if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
        warn!("Failed to install Prometheus recorder: {}. This might happen if the port is already in use.", e);
        return;
    }

    describe_metrics();
    info!("Metrics exporter listening on {}", addr);
}

fn describe_metrics() {
    describe_counter!("crawl_runs_total", "Finished crawl jobs by status");
    describe_counter!("crawl_attempts_total", "Whole-crawl attempts including retries");
    describe_counter!("crawl_chapters_total", "Chapter outcomes by kind");
    describe_counter!("scheduler_ticks_total", "Scheduler due-check ticks");
    describe_counter!("scheduler_lock_events_total", "Scheduler lock lifecycle events");
    describe_histogram!(
        "crawl_duration_seconds",
        Unit::Seconds,
        "Wall-clock duration of a crawl job"
    );
}

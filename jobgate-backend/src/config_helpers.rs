use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;

use jobgate_config::{AutomationConfig, Config};
use jobgate_job_queue::JobKind;
use jobgate_jobs::AutomationExecutor;

/// Parse host:port into a SocketAddr, with fallback to 0.0.0.0.
pub fn parse_bind_address(host: &str, port: u16) -> SocketAddr {
    host.parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, port))
        .or_else(|_| host.parse::<SocketAddr>())
        .or_else(|_| host.parse::<Ipv6Addr>().map(|ip| SocketAddr::new(IpAddr::V6(ip), port)))
        .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], port)))
}

fn automation_for(kind: JobKind, cfg: &AutomationConfig) -> Option<AutomationExecutor> {
    let program = cfg.active_program()?;
    Some(AutomationExecutor::new(kind, program).with_args(cfg.args.clone()))
}

/// One executor per enabled automation. Kinds left out stay unavailable.
pub fn automations_from_config(cfg: &Config) -> Vec<AutomationExecutor> {
    let automations = &cfg.automations;
    [
        (JobKind::InvoiceDownload, &automations.invoice_download),
        (JobKind::ReportGeneration, &automations.report_generation),
        (JobKind::BatchLookup, &automations.batch_lookup),
    ]
    .into_iter()
    .filter_map(|(kind, automation)| automation_for(kind, automation))
    .collect()
}

/// Create the uploads and work directories, returning them as absolute paths.
pub async fn prepare_directories(cfg: &Config) -> std::io::Result<(PathBuf, PathBuf)> {
    let uploads = PathBuf::from(&cfg.uploads.directory);
    let work_root = PathBuf::from(&cfg.jobs.work_root);
    tokio::fs::create_dir_all(&uploads).await?;
    tokio::fs::create_dir_all(&work_root).await?;
    Ok((
        tokio::fs::canonicalize(&uploads).await?,
        tokio::fs::canonicalize(&work_root).await?,
    ))
}

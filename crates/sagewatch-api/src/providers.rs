//! `ResourceProvider` implementations backed by [`SageMakerClient`].

use crate::client::SageMakerClient;
use crate::errors::Result;
use crate::provider::ResourceProvider;
use async_trait::async_trait;
use log::{debug, warn};
use sagewatch_core::{ResourceKind, ResourceRecord};
use std::sync::Arc;

fn in_service(records: impl IntoIterator<Item = ResourceRecord>) -> Vec<ResourceRecord> {
    records
        .into_iter()
        .filter(|record| {
            let keep = record.is_in_service();
            if !keep {
                debug!("Skipping {} {} in state {}", record.kind, record.name, record.status);
            }
            keep
        })
        .collect()
}

/// Lists in-service inference endpoints.
///
/// The listing call does not expose instance details; in detailed mode each
/// endpoint is described to fill in instance type and count.
#[derive(Debug, Clone)]
pub struct EndpointProvider {
    client: Arc<SageMakerClient>,
    detailed: bool,
}

impl EndpointProvider {
    pub fn new(client: Arc<SageMakerClient>, detailed: bool) -> Self {
        Self { client, detailed }
    }

    async fn describe(&self, record: &mut ResourceRecord) -> Result<()> {
        let description = self.client.describe_endpoint(&record.name).await?;

        let count: u32 = description
            .production_variants
            .iter()
            .filter_map(|variant| variant.current_instance_count)
            .sum();
        if count > 0 {
            record.instance_count = count;
        }

        if let Some(config_name) = description.endpoint_config_name {
            let config = self.client.describe_endpoint_config(&config_name).await?;
            if let Some(instance_type) = config
                .production_variants
                .into_iter()
                .find_map(|variant| variant.instance_type)
            {
                record.instance_type = instance_type;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl ResourceProvider for EndpointProvider {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Endpoint
    }

    async fn list(&self) -> Result<Vec<ResourceRecord>> {
        let summaries = self.client.list_endpoints().await?;
        let mut records = in_service(summaries.into_iter().map(ResourceRecord::from));

        if self.detailed {
            for record in records.iter_mut() {
                // The endpoint may have gone away since the listing call
                let described = self.describe(record).await;
                if let Err(e) = described {
                    warn!("Could not describe endpoint {}: {}", record.name, e);
                }
            }
        }

        Ok(records)
    }
}

/// Lists in-service notebook instances.
#[derive(Debug, Clone)]
pub struct NotebookProvider {
    client: Arc<SageMakerClient>,
    detailed: bool,
}

impl NotebookProvider {
    pub fn new(client: Arc<SageMakerClient>, detailed: bool) -> Self {
        Self { client, detailed }
    }
}

#[async_trait]
impl ResourceProvider for NotebookProvider {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Notebook
    }

    async fn list(&self) -> Result<Vec<ResourceRecord>> {
        let summaries = self.client.list_notebook_instances().await?;
        let mut records = in_service(summaries.into_iter().map(ResourceRecord::from));

        if self.detailed {
            for record in records.iter_mut() {
                let described = self.client.describe_notebook_instance(&record.name).await;
                match described {
                    Ok(description) => record.volume_size_gb = description.volume_size_in_gb,
                    Err(e) => warn!("Could not describe notebook {}: {}", record.name, e),
                }
            }
        }

        Ok(records)
    }
}

/// Lists in-service Studio apps across all domains.
#[derive(Debug, Clone)]
pub struct AppProvider {
    client: Arc<SageMakerClient>,
}

impl AppProvider {
    pub fn new(client: Arc<SageMakerClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceProvider for AppProvider {
    fn kind(&self) -> ResourceKind {
        ResourceKind::App
    }

    async fn list(&self) -> Result<Vec<ResourceRecord>> {
        let apps = self.client.list_apps().await?;
        Ok(in_service(apps.into_iter().map(ResourceRecord::from)))
    }
}

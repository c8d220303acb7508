use crate::aggregator::ResponseAggregator;
use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::fetcher::ODataFetcher;
use crate::field_guide::{AllowList, FieldGuide};
use crate::io_struct::AskResponse;
use crate::prompt::PromptTemplate;
use crate::translator::IntentTranslator;
use log::{error, info};
use std::time::Duration;

/// Read-only per-process state shared by all requests.
pub struct RelayState {
    pub translator: IntentTranslator,
    pub aggregator: ResponseAggregator<ODataFetcher>,
}

impl RelayState {
    pub fn new(config: &RelayConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .pool_idle_timeout(Some(Duration::from_secs(50)))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        let template = match &config.prompt_template_path {
            Some(path) => PromptTemplate::from_file(path)?,
            None => PromptTemplate::default(),
        };
        let allow_list = AllowList::default();
        let translator = IntentTranslator::new(
            client.clone(),
            config,
            template,
            &FieldGuide::default(),
            &allow_list,
        )?;
        let fetcher = ODataFetcher::new(
            client,
            &config.odata_base_url,
            config.credentials.clone(),
        );
        Ok(Self {
            translator,
            aggregator: ResponseAggregator::new(fetcher, allow_list),
        })
    }

    pub async fn ask(&self, user_query: &str) -> Result<AskResponse, RelayError> {
        let reply = self.translator.translate(user_query).await.map_err(|e| {
            error!("Intent translation failed: {}", e);
            RelayError::from(e)
        })?;
        info!(
            "Interpretation: {:?}, {} view descriptor(s)",
            reply.interpretation,
            reply.views.len()
        );
        Ok(self.aggregator.aggregate(reply).await)
    }
}

use std::error::Error;
use std::io::{BufRead, Write};
use std::path::PathBuf;

use tokio_util::sync::CancellationToken;
use url::Url;

use dfs_cli::api::{ApiError, HttpGateway, HttpPublisher};
use dfs_cli::state::{AppConfig, AppState, StateError};

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("state error: {0}")]
    State(#[from] StateError),
    #[error("no gateway configured; pass --gateway-url or set gateway_url in the config")]
    NoGateway,
    #[error("no event bus configured; pass --events-url or set events_url in the config")]
    NoEvents,
    #[error("no storage root given; pass --root or set storage_root in the config")]
    NoStorageRoot,
    #[error("API client error: {0}")]
    Api(#[from] ApiError),
}

#[derive(Clone)]
pub struct OpContext {
    /// Optional custom config path (defaults to ~/.dfs)
    pub config_path: Option<PathBuf>,
    /// Loaded configuration, defaults if never initialized
    pub config: AppConfig,
    pub gateway_url: Option<Url>,
    pub events_url: Option<Url>,
    pub verbose: bool,
    /// Cancelled on SIGINT / SIGTERM
    pub cancel: CancellationToken,
}

impl OpContext {
    pub fn new(
        config_path: Option<PathBuf>,
        gateway_url: Option<Url>,
        events_url: Option<Url>,
        verbose: bool,
        cancel: CancellationToken,
    ) -> Result<Self, StateError> {
        let config = AppState::load_or_default(config_path.clone())?;
        Ok(Self {
            config_path,
            config,
            gateway_url,
            events_url,
            verbose,
            cancel,
        })
    }

    /// Storage root from the flag, falling back to the config
    pub fn storage_root(&self, flag: Option<&PathBuf>) -> Result<PathBuf, ContextError> {
        flag.cloned()
            .or_else(|| self.config.storage_root.clone())
            .ok_or(ContextError::NoStorageRoot)
    }

    pub fn gateway(&self) -> Result<HttpGateway, ContextError> {
        let url = self
            .gateway_url
            .as_ref()
            .or(self.config.gateway_url.as_ref())
            .ok_or(ContextError::NoGateway)?;
        Ok(HttpGateway::new(url)?)
    }

    pub fn publisher(&self) -> Result<HttpPublisher, ContextError> {
        let url = self
            .events_url
            .as_ref()
            .or(self.config.events_url.as_ref())
            .ok_or(ContextError::NoEvents)?;
        Ok(HttpPublisher::new(url)?)
    }
}

#[async_trait::async_trait]
pub trait Op: Send + Sync {
    type Error: Error + Send + Sync + 'static;
    type Output;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error>;
}

/// Print `question` and read one trimmed, lowercased line of input
///
/// Stdin is read on the blocking pool so the runtime workers stay free.
pub async fn prompt(question: &str) -> std::io::Result<String> {
    let question = question.to_string();
    tokio::task::spawn_blocking(move || {
        let mut stdout = std::io::stdout();
        write!(stdout, "{}", question)?;
        stdout.flush()?;
        read_answer(std::io::stdin().lock())
    })
    .await
    .map_err(std::io::Error::other)?
}

fn read_answer(mut input: impl BufRead) -> std::io::Result<String> {
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(answer.trim().to_lowercase())
}

#[macro_export]
macro_rules! command_enum {
    ($(($variant:ident, $type:ty)),* $(,)?) => {
        #[derive(Subcommand, Debug, Clone)]
        pub enum Command {
            $($variant($type),)*
        }

        #[derive(Debug)]
        pub enum OpOutput {
            $($variant(<$type as $crate::cli::op::Op>::Output),)*
        }

        #[derive(Debug, thiserror::Error)]
        pub enum OpError {
            $(
                #[error(transparent)]
                $variant(<$type as $crate::cli::op::Op>::Error),
            )*
        }

        #[async_trait::async_trait]
        impl $crate::cli::op::Op for Command {
            type Output = OpOutput;
            type Error = OpError;

            async fn execute(&self, ctx: &$crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
                match self {
                    $(
                        Command::$variant(op) => {
                            op.execute(ctx).await
                                .map(OpOutput::$variant)
                                .map_err(OpError::$variant)
                        },
                    )*
                }
            }
        }

        impl std::fmt::Display for OpOutput {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        OpOutput::$variant(output) => write!(f, "{}", output),
                    )*
                }
            }
        }
    };
}

#[cfg(test)]
impl OpContext {
    /// Context over `config` with no flags set
    pub fn with_config(config: AppConfig) -> Self {
        Self {
            config_path: None,
            config,
            gateway_url: None,
            events_url: None,
            verbose: false,
            cancel: CancellationToken::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(config: AppConfig) -> OpContext {
        OpContext::with_config(config)
    }

    #[test]
    fn test_read_answer_normalizes() {
        let answer = read_answer(std::io::Cursor::new(" Yes \nignored\n")).unwrap();
        assert_eq!(answer, "yes");
        assert_eq!(read_answer(std::io::Cursor::new("")).unwrap(), "");
    }

    #[test]
    fn test_storage_root_flag_wins() {
        let ctx = context(AppConfig {
            storage_root: Some(PathBuf::from("/from/config")),
            ..Default::default()
        });
        let flag = PathBuf::from("/from/flag");
        assert_eq!(ctx.storage_root(Some(&flag)).unwrap(), flag);
        assert_eq!(ctx.storage_root(None).unwrap(), PathBuf::from("/from/config"));
        assert!(matches!(
            context(AppConfig::default()).storage_root(None),
            Err(ContextError::NoStorageRoot)
        ));
    }

    #[test]
    fn test_gateway_requires_url() {
        let mut ctx = context(AppConfig::default());
        assert!(matches!(ctx.gateway(), Err(ContextError::NoGateway)));

        ctx.gateway_url = Some(Url::parse("http://localhost:9142").unwrap());
        assert_eq!(
            ctx.gateway().unwrap().base_url().as_str(),
            "http://localhost:9142/"
        );
    }
}

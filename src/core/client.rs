use crate::core::errors::{Error, Result};
use crate::core::feeds::{self, Feed, Provider};
use crate::core::range_record::RangeRecord;
use log::{info, warn};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::{thread, time};

/*-------------------------------------------------------------------------------------------------
  Simple Interface
-------------------------------------------------------------------------------------------------*/

/// _**Simple library interface**_ retrieves and parses the range feeds of every provider with a
/// configured URL, using the default client configuration (including any `CLOUDRANGER_*`
/// environment variables). The returned records can be passed to
/// [Ranger::from_records](crate::Ranger::from_records) or saved with
/// [write_csv](crate::write_csv).
///
/// ```no_run
/// let records = cloudranger::get_records().unwrap();
/// let ranger = cloudranger::Ranger::from_records(records);
/// let (result, found) = ranger.get_ip("3.5.140.101");
/// ```
pub fn get_records() -> Result<Vec<RangeRecord>> {
    Client::new().get_records(&Provider::ALL)
}

/*-------------------------------------------------------------------------------------------------
  Client Builder
-------------------------------------------------------------------------------------------------*/

/// A builder for the [Client] struct that allows you to customize the client configuration. The
/// [ClientBuilder] struct provides setters for each configuration value and a
/// [ClientBuilder::build] method to create a [Client] instance.
///
/// ```
/// use cloudranger::Provider;
///
/// let client = cloudranger::ClientBuilder::new()
///     .url(Provider::Azure, "https://example.com/ServiceTags_Public.json")
///     .cache_dir("/tmp/cloudranger")
///     .cache_time(60 * 60) // 1 hour
///     .retry_count(4)
///     .retry_initial_delay(200) // 200 ms
///     .retry_backoff_factor(2)
///     .retry_timeout(5000) // 5 seconds
///     .build();
/// ```
///
/// The [ClientBuilder::new] method attempts to source configuration values from environment
/// variables when set and uses default values when the environment variables are not set.
///
/// If you want to use the default configuration values, ignoring any environment variables, use
/// the [ClientBuilder::default] method to create a new [ClientBuilder] instance.
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    urls: BTreeMap<Provider, String>,
    cache_dir: PathBuf,
    cache_time: u64,
    retry_count: u32,
    retry_initial_delay: u64,
    retry_backoff_factor: u64,
    retry_timeout: u64,
}

/*--------------------------------------------------------------------------------------
  Client Builder Implementation
--------------------------------------------------------------------------------------*/

impl Default for ClientBuilder {
    /// Create a new [ClientBuilder] with default configuration values.
    ///
    /// ```
    /// use cloudranger::Provider;
    ///
    /// let client = cloudranger::ClientBuilder::default().build();
    ///
    /// assert_eq!(client.url(Provider::Aws), Some("https://ip-ranges.amazonaws.com/ip-ranges.json"));
    /// assert_eq!(client.url(Provider::Azure), None);
    /// assert_eq!(client.cache_time(), 86400);
    /// assert_eq!(client.retry_count(), 4);
    /// assert_eq!(client.retry_initial_delay(), 200);
    /// assert_eq!(client.retry_backoff_factor(), 2);
    /// assert_eq!(client.retry_timeout(), 5000);
    /// ```
    fn default() -> Self {
        Self {
            urls: Provider::ALL
                .into_iter()
                .filter_map(|provider| {
                    provider
                        .default_url()
                        .map(|url| (provider, url.to_string()))
                })
                .collect(),
            cache_dir: default_cache_dir(), // ${HOME}/.cache/cloudranger
            cache_time: 24 * 60 * 60,       // 24 hours
            retry_count: 4,
            retry_initial_delay: 200, // 200 ms
            retry_backoff_factor: 2,
            retry_timeout: 5000, // 5 seconds
        }
    }
}

impl ClientBuilder {
    /// Create a new [ClientBuilder] reading initial configuration values from
    /// environment variables when set and default values when the environment
    /// variables are not set.
    ///
    /// The environment variables used to set the initial configuration values
    /// are:
    /// - `CLOUDRANGER_<PROVIDER>_URL` (e.g. `CLOUDRANGER_AZURE_URL`)
    /// - `CLOUDRANGER_CACHE_DIR`
    /// - `CLOUDRANGER_CACHE_TIME`
    /// - `CLOUDRANGER_RETRY_COUNT`
    /// - `CLOUDRANGER_RETRY_INITIAL_DELAY`
    /// - `CLOUDRANGER_RETRY_BACKOFF_FACTOR`
    /// - `CLOUDRANGER_RETRY_TIMEOUT`
    pub fn new() -> Self {
        let mut default = ClientBuilder::default();

        for provider in Provider::ALL {
            if let Some(url) = get_optional_env_var::<String>(&url_env_var(provider)) {
                default.urls.insert(provider, url);
            }
        }

        Self {
            urls: default.urls,
            cache_dir: get_env_var("CLOUDRANGER_CACHE_DIR", default.cache_dir),
            cache_time: get_env_var("CLOUDRANGER_CACHE_TIME", default.cache_time),
            retry_count: get_env_var("CLOUDRANGER_RETRY_COUNT", default.retry_count),
            retry_initial_delay: get_env_var(
                "CLOUDRANGER_RETRY_INITIAL_DELAY",
                default.retry_initial_delay,
            ),
            retry_backoff_factor: get_env_var(
                "CLOUDRANGER_RETRY_BACKOFF_FACTOR",
                default.retry_backoff_factor,
            ),
            retry_timeout: get_env_var("CLOUDRANGER_RETRY_TIMEOUT", default.retry_timeout),
        }
    }

    /*-------------------------------------------------------------------------
      Setters
    -------------------------------------------------------------------------*/

    /// Set the URL used to retrieve a provider's range feed. Every provider except Azure has
    /// a default; Azure's Service Tags URL changes with each weekly release.
    pub fn url<'s>(&'s mut self, provider: Provider, url: &str) -> &'s mut Self {
        self.urls.insert(provider, url.to_string());
        self
    }

    /// Set the directory used to cache the provider feeds; defaults to
    /// `${HOME}/.cache/cloudranger` (the platform cache directory).
    pub fn cache_dir<P: AsRef<Path>>(&mut self, cache_dir: P) -> &mut Self {
        self.cache_dir = cache_dir.as_ref().to_path_buf();
        self
    }

    /// Set the cache-time duration - the amount of time (in seconds) a locally
    /// cached feed is considered fresh; defaults to 24 hours (`86400` seconds).
    /// A cache time of `0` always refreshes from the feed URL.
    pub fn cache_time(&mut self, cache_time: u64) -> &mut Self {
        self.cache_time = cache_time;
        self
    }

    /// Set the number of attempts to retrieve a feed from its URL; defaults to
    /// `4` attempts.
    pub fn retry_count(&mut self, retry_count: u32) -> &mut Self {
        self.retry_count = retry_count;
        self
    }

    /// Set the initial delay (in milliseconds) between retry attempts; defaults
    /// to `200` milliseconds.
    ///
    /// The delay between retry attempts is calculated as:
    /// `retry_initial_delay * (retry_backoff_factor ^ attempt)`.
    pub fn retry_initial_delay(&mut self, retry_initial_delay: u64) -> &mut Self {
        self.retry_initial_delay = retry_initial_delay;
        self
    }

    /// Set the backoff factor used to increase the delay between retry
    /// attempts; defaults to `2`.
    pub fn retry_backoff_factor(&mut self, retry_backoff_factor: u64) -> &mut Self {
        self.retry_backoff_factor = retry_backoff_factor;
        self
    }

    /// Set the maximum time (in milliseconds) to spend retrieving a feed from
    /// its URL; defaults to `5000` milliseconds (5 seconds).
    pub fn retry_timeout(&mut self, retry_timeout: u64) -> &mut Self {
        self.retry_timeout = retry_timeout;
        self
    }

    /*-------------------------------------------------------------------------
      Build Method
    -------------------------------------------------------------------------*/

    pub fn build(&self) -> Client {
        Client {
            urls: self.urls.clone(),
            cache_dir: self.cache_dir.clone(),
            cache_time: self.cache_time,
            retry_count: self.retry_count,
            retry_initial_delay: self.retry_initial_delay,
            retry_backoff_factor: self.retry_backoff_factor,
            retry_timeout: self.retry_timeout,
        }
    }
}

/*-------------------------------------------------------------------------------------------------
  Client
-------------------------------------------------------------------------------------------------*/

/// A client for retrieving provider range feeds from cached files, when available and fresh,
/// or from the feed URLs when the cache is stale or unavailable. Client implements a simple
/// exponential-backoff retry mechanism and falls back to a stale cache when a URL cannot be
/// retrieved.
///
/// The [Client::new] method attempts to source configuration values from environment variables
/// when set and uses default values when the environment variables are not set.
///
/// ```no_run
/// use cloudranger::Provider;
///
/// let client = cloudranger::Client::new();
/// let feed = client.get_feed(Provider::Cloudflare).unwrap();
/// println!("{} Cloudflare ranges", feed.records.len());
/// ```
#[derive(Debug, Clone)]
pub struct Client {
    urls: BTreeMap<Provider, String>,
    cache_dir: PathBuf,
    cache_time: u64,
    retry_count: u32,
    retry_initial_delay: u64,
    retry_backoff_factor: u64,
    retry_timeout: u64,
}

/*--------------------------------------------------------------------------------------
  Client Implementation
--------------------------------------------------------------------------------------*/

impl Default for Client {
    /// Create a new [Client] with default configuration values.
    fn default() -> Self {
        ClientBuilder::default().build()
    }
}

impl Client {
    pub fn new() -> Self {
        ClientBuilder::new().build()
    }

    /*-------------------------------------------------------------------------
      Getters
    -------------------------------------------------------------------------*/

    /// Get the URL used to retrieve a provider's range feed.
    pub fn url(&self, provider: Provider) -> Option<&str> {
        self.urls.get(&provider).map(String::as_str)
    }

    /// Get the directory used to cache the provider feeds.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Get the file path used to cache a provider's feed.
    pub fn cache_file(&self, provider: Provider) -> PathBuf {
        self.cache_dir.join(provider.cache_file_name())
    }

    /// Get the cache-time duration (in seconds).
    pub fn cache_time(&self) -> u64 {
        self.cache_time
    }

    /// Get the number of attempts to retrieve a feed from its URL.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Get the initial delay (in milliseconds) between retry attempts.
    pub fn retry_initial_delay(&self) -> u64 {
        self.retry_initial_delay
    }

    /// Get the backoff factor used to increase the delay between retry attempts.
    pub fn retry_backoff_factor(&self) -> u64 {
        self.retry_backoff_factor
    }

    /// Get the maximum time (in milliseconds) to spend retrieving a feed from its URL.
    pub fn retry_timeout(&self) -> u64 {
        self.retry_timeout
    }

    /*-------------------------------------------------------------------------
      Get Records
    -------------------------------------------------------------------------*/

    /// Retrieve and parse the feeds of the provided providers, returning their records in
    /// provider order. Providers without a configured URL or cached feed are skipped.
    pub fn get_records(&self, providers: &[Provider]) -> Result<Vec<RangeRecord>> {
        let mut records = Vec::new();

        for provider in providers {
            if self.url(*provider).is_none() && !self.cache_file(*provider).exists() {
                warn!(
                    "No URL configured for the {} feed; skipping (set {})",
                    provider,
                    url_env_var(*provider)
                );
                continue;
            }

            let feed = self.get_feed(*provider)?;
            info!("Retrieved {} {} range records", feed.records.len(), provider);
            records.extend(feed.records);
        }

        Ok(records)
    }

    /*-------------------------------------------------------------------------
      Get Feed
    -------------------------------------------------------------------------*/

    /// Retrieves and parses a provider's feed. Uses the locally cached feed when available
    /// and fresh. Requests the feed from its URL when the local cache is stale or
    /// unavailable, and falls back to a stale cache when the request fails.
    pub fn get_feed(&self, provider: Provider) -> Result<Feed> {
        let cache_file = self.cache_file(provider);
        info!("Cache time {} seconds", self.cache_time);
        info!("Cache file path: {:?}", &cache_file);

        // Check if cache file exists
        let cache_exists = fs::metadata(&cache_file).is_ok();
        if cache_exists {
            info!("Cache file exists");
        } else {
            info!("Cache file not found");
        };

        // Check if cache file is fresh
        let cache_is_fresh = cache_exists && self.cache_is_fresh(&cache_file);
        if cache_is_fresh {
            info!("Cache file is fresh");
        } else {
            info!("Cache file is stale; refresh cache");
        };

        // Fresh cached feed
        if cache_is_fresh {
            let fresh_cached_feed = self.get_feed_from_file(provider);
            if fresh_cached_feed.is_ok() {
                return fresh_cached_feed;
            }
        };

        // Fresh URL feed
        let url_result = match self.url(provider) {
            Some(url) => self.get_feed_from_url(provider, url),
            None => Err(format!(
                "No URL configured for the {} feed (set {})",
                provider,
                url_env_var(provider)
            )
            .into()),
        };
        if let Ok((text, feed)) = url_result {
            let _ = self.cache_text_to_file(provider, &text);
            return Ok(feed);
        };

        // Stale cached feed
        if cache_exists && !cache_is_fresh {
            let stale_cached_feed = self.get_feed_from_file(provider);
            if stale_cached_feed.is_ok() {
                warn!("Using stale cached {} feed", provider);
                return stale_cached_feed;
            }
        };

        // Return result (Err) retrieving the feed from its URL
        url_result.map(|(_, feed)| feed)
    }

    /*-------------------------------------------------------------------------
      Private Methods
    -------------------------------------------------------------------------*/

    /// A cached feed is fresh while its age is below the cache time. A modification time in
    /// the future (clock skew) counts as stale.
    fn cache_is_fresh(&self, cache_file: &Path) -> bool {
        fs::metadata(cache_file)
            .and_then(|metadata| metadata.modified())
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .is_some_and(|age| age.as_secs() < self.cache_time)
    }

    /// Get a provider's feed from its URL; returns the feed text alongside the parsed feed.
    fn get_feed_from_url(&self, provider: Provider, url: &str) -> Result<(String, Feed)> {
        let start_time = time::Instant::now();
        let max_elapsed_time = time::Duration::from_millis(self.retry_timeout);

        let http_client = reqwest::blocking::Client::builder()
            .timeout(max_elapsed_time)
            .build()?;

        let mut attempt: u32 = 0;
        loop {
            info!(
                "Get {} feed from URL; Attempt {}: GET {}",
                provider, attempt, url
            );
            let result: Result<(String, Feed)> = http_client
                .get(url)
                .send()
                .and_then(|response| response.error_for_status())
                .and_then(|response| response.text())
                .map_err(Error::from)
                .and_then(|text| feeds::parse(provider, &text).map(|feed| (text, feed)));

            match result {
                Ok(result) => {
                    info!("Get {} feed from URL; Attempt {}: Ok", provider, attempt);
                    break Ok(result);
                }
                Err(error) => {
                    log::error!(
                        "Get {} feed from URL; Attempt {}: FAILED: {}",
                        provider,
                        attempt,
                        error
                    );

                    let delay = time::Duration::from_millis(
                        self.retry_initial_delay
                            .saturating_mul(self.retry_backoff_factor.saturating_pow(attempt)),
                    );

                    attempt += 1;

                    if (start_time.elapsed() + delay < max_elapsed_time)
                        && (attempt < self.retry_count)
                    {
                        thread::sleep(delay);
                        continue;
                    } else {
                        break Err(error);
                    }
                }
            }
        }
    }

    /// Write a provider's feed text to its cache file.
    fn cache_text_to_file(&self, provider: Provider, text: &str) -> Result<()> {
        let cache_file = self.cache_file(provider);

        // Ensure parent directories exist
        if let Some(parent) = cache_file.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&cache_file, text)
            .inspect(|_| info!("Successfully cached {} feed to: {:?}", provider, &cache_file))
            .map_err(Error::from)
            .inspect_err(|error| {
                log::error!(
                    "Failed to cache {} feed to `{:?}`: {}",
                    provider,
                    &cache_file,
                    error
                )
            })
    }

    /// Get a provider's feed from its cache file.
    fn get_feed_from_file(&self, provider: Provider) -> Result<Feed> {
        let cache_file = self.cache_file(provider);

        fs::read_to_string(&cache_file)
            .map_err(Error::from)
            .and_then(|text| feeds::parse(provider, &text))
            .inspect(|_| {
                info!(
                    "Successfully read {} feed from: {:?}",
                    provider, &cache_file
                )
            })
            .inspect_err(|error| {
                log::error!(
                    "Failed to read {} feed from `{:?}`: {}",
                    provider,
                    &cache_file,
                    error
                )
            })
    }
}

/*-------------------------------------------------------------------------------------------------
  Helper Functions
-------------------------------------------------------------------------------------------------*/

/// Platform cache directory, falling back to the temporary directory.
fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(env::temp_dir)
        .join("cloudranger")
}

/// Environment variable overriding a provider's feed URL.
fn url_env_var(provider: Provider) -> String {
    format!("CLOUDRANGER_{}_URL", provider.code().to_uppercase())
}

/// Get and parse an environment variable value or return a default value.
fn get_env_var<T: std::str::FromStr>(env_var: &str, default: T) -> T {
    get_optional_env_var(env_var).unwrap_or(default)
}

/// Get and parse an environment variable value when it is set and valid.
fn get_optional_env_var<T: std::str::FromStr>(env_var: &str) -> Option<T> {
    env::var(env_var).ok().and_then(|value| {
        value
            .parse::<T>()
            .inspect(|_| info!("Using {}: {}", env_var, value))
            .inspect_err(|_| warn!("Invalid {}: {}", env_var, value))
            .ok()
    })
}

/*-------------------------------------------------------------------------------------------------
  Unit Tests
-------------------------------------------------------------------------------------------------*/

//! Query builders for the REST datastore

use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::Error;
use crate::fetch::Fetch;

const CLIENT_INFO: &str = "rent-a-bike/0.2.0";

/// Base query builder
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    /// Query parameters
    params: HashMap<String, String>,
}

impl QueryBuilder {
    /// Create a new QueryBuilder
    pub fn new() -> Self {
        Self {
            params: HashMap::new(),
        }
    }

    /// Add a parameter to the query
    pub fn add_param(&mut self, key: &str, value: &str) {
        self.params.insert(key.to_string(), value.to_string());
    }

    /// Get the query parameters
    pub fn get_params(&self) -> &HashMap<String, String> {
        &self.params
    }
}

/// Builder for SELECT queries
pub struct SelectBuilder {
    url: String,
    key: String,
    client: Client,
    timeout: Option<Duration>,
    query: QueryBuilder,
}

impl SelectBuilder {
    /// Create a new SelectBuilder
    pub fn new(
        url: String,
        key: String,
        columns: &str,
        client: Client,
        timeout: Option<Duration>,
    ) -> Self {
        let mut query = QueryBuilder::new();
        query.add_param("select", columns);

        Self {
            url,
            key,
            client,
            timeout,
            query,
        }
    }

    /// Filter rows where column equals a value
    pub fn eq<T: ToString>(mut self, column: &str, value: T) -> Self {
        let filter = format!("eq.{}", value.to_string());
        self.query.add_param(column, &filter);
        self
    }

    /// Filter rows where column matches a pattern (case insensitive)
    pub fn ilike(mut self, column: &str, pattern: &str) -> Self {
        let filter = format!("ilike.{}", pattern);
        self.query.add_param(column, &filter);
        self
    }

    /// Limit the number of rows returned
    pub fn limit(mut self, count: i32) -> Self {
        self.query.add_param("limit", &count.to_string());
        self
    }

    /// Order the results by a column
    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.query
            .add_param("order", &format!("{}.{}", column, direction));
        self
    }

    /// Execute the query and return the results
    pub async fn execute<T: DeserializeOwned>(&self) -> Result<Vec<T>, Error> {
        let fetch = Fetch::get(&self.client, &self.url)
            .header("apikey", &self.key)
            .header("X-Client-Info", CLIENT_INFO)
            .timeout(self.timeout)
            .query(self.query.get_params().clone());

        let result = fetch
            .execute::<Vec<T>>()
            .await
            .map_err(Error::into_read)?;
        Ok(result)
    }

    /// Execute the query and return the first row
    pub async fn execute_one<T: DeserializeOwned>(self) -> Result<Option<T>, Error> {
        let results = self.limit(1).execute::<T>().await?;
        Ok(results.into_iter().next())
    }
}

/// Builder for INSERT queries
pub struct InsertBuilder<T: Serialize> {
    url: String,
    key: String,
    values: T,
    client: Client,
    timeout: Option<Duration>,
    query: QueryBuilder,
}

impl<T: Serialize> InsertBuilder<T> {
    /// Create a new InsertBuilder
    pub fn new(
        url: String,
        key: String,
        values: T,
        client: Client,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            url,
            key,
            values,
            client,
            timeout,
            query: QueryBuilder::new(),
        }
    }

    /// Execute the query and return the inserted rows
    pub async fn execute<R: DeserializeOwned>(&self) -> Result<Vec<R>, Error> {
        let fetch = Fetch::post(&self.client, &self.url)
            .header("apikey", &self.key)
            .header("X-Client-Info", CLIENT_INFO)
            .header("Prefer", "return=representation")
            .timeout(self.timeout)
            .query(self.query.get_params().clone())
            .json(&self.values)?;

        let result = fetch
            .execute::<Vec<R>>()
            .await
            .map_err(Error::into_write)?;
        Ok(result)
    }

    /// Execute the query without returning the inserted data
    pub async fn execute_no_return(&self) -> Result<(), Error> {
        let fetch = Fetch::post(&self.client, &self.url)
            .header("apikey", &self.key)
            .header("X-Client-Info", CLIENT_INFO)
            .header("Prefer", "return=minimal")
            .timeout(self.timeout)
            .query(self.query.get_params().clone())
            .json(&self.values)?;

        fetch
            .execute_no_content()
            .await
            .map_err(Error::into_write)?;
        Ok(())
    }
}

/// Builder for UPDATE queries
pub struct UpdateBuilder<T: Serialize> {
    url: String,
    key: String,
    values: T,
    client: Client,
    timeout: Option<Duration>,
    query: QueryBuilder,
}

impl<T: Serialize> UpdateBuilder<T> {
    /// Create a new UpdateBuilder
    pub fn new(
        url: String,
        key: String,
        values: T,
        client: Client,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            url,
            key,
            values,
            client,
            timeout,
            query: QueryBuilder::new(),
        }
    }

    /// Filter rows where column equals a value
    pub fn eq<V: ToString>(mut self, column: &str, value: V) -> Self {
        let filter = format!("eq.{}", value.to_string());
        self.query.add_param(column, &filter);
        self
    }

    /// Execute the query and return the updated rows
    pub async fn execute<R: DeserializeOwned>(&self) -> Result<Vec<R>, Error> {
        let fetch = Fetch::patch(&self.client, &self.url)
            .header("apikey", &self.key)
            .header("X-Client-Info", CLIENT_INFO)
            .header("Prefer", "return=representation")
            .timeout(self.timeout)
            .query(self.query.get_params().clone())
            .json(&self.values)?;

        let result = fetch
            .execute::<Vec<R>>()
            .await
            .map_err(Error::into_write)?;
        Ok(result)
    }

    /// Execute the query without returning the updated data
    pub async fn execute_no_return(&self) -> Result<(), Error> {
        let fetch = Fetch::patch(&self.client, &self.url)
            .header("apikey", &self.key)
            .header("X-Client-Info", CLIENT_INFO)
            .header("Prefer", "return=minimal")
            .timeout(self.timeout)
            .query(self.query.get_params().clone())
            .json(&self.values)?;

        fetch
            .execute_no_content()
            .await
            .map_err(Error::into_write)?;
        Ok(())
    }
}

/// Builder for DELETE queries
pub struct DeleteBuilder {
    url: String,
    key: String,
    client: Client,
    timeout: Option<Duration>,
    query: QueryBuilder,
}

impl DeleteBuilder {
    /// Create a new DeleteBuilder
    pub fn new(url: String, key: String, client: Client, timeout: Option<Duration>) -> Self {
        Self {
            url,
            key,
            client,
            timeout,
            query: QueryBuilder::new(),
        }
    }

    /// Filter rows where column equals a value
    pub fn eq<V: ToString>(mut self, column: &str, value: V) -> Self {
        let filter = format!("eq.{}", value.to_string());
        self.query.add_param(column, &filter);
        self
    }

    /// Execute the query without returning the deleted data
    pub async fn execute_no_return(&self) -> Result<(), Error> {
        let fetch = Fetch::delete(&self.client, &self.url)
            .header("apikey", &self.key)
            .header("X-Client-Info", CLIENT_INFO)
            .header("Prefer", "return=minimal")
            .timeout(self.timeout)
            .query(self.query.get_params().clone());

        fetch
            .execute_no_content()
            .await
            .map_err(Error::into_write)?;
        Ok(())
    }
}

use common::api::{CreateUserRequest, ListEnvelope, UpdateRoleRequest, UserDetail};
use reqwest::Method;

use super::encode_segment;
use crate::error::Result;
use crate::transport::{RequestOptions, Transport};

pub struct UsersResource<'a> {
    transport: &'a Transport,
}

impl<'a> UsersResource<'a> {
    pub(crate) fn new(transport: &'a Transport) -> Self {
        Self { transport }
    }

    /// One page of users; `total` is kept for pagination.
    pub async fn list(&self, page: Option<u32>, page_size: Option<u32>) -> Result<ListEnvelope<UserDetail>> {
        let opts = RequestOptions::new()
            .query_opt("page", page)
            .query_opt("page_size", page_size);
        self.transport.request(Method::GET, "/v1/users", opts).await
    }

    pub async fn get(&self, user_id: &str) -> Result<UserDetail> {
        self.transport
            .get(&format!("/v1/users/{}", encode_segment(user_id)))
            .await
    }

    pub async fn create(&self, request: &CreateUserRequest) -> Result<UserDetail> {
        self.transport.post_json("/v1/users", request).await
    }

    pub async fn update_role(&self, user_id: &str, api_role: &str) -> Result<UserDetail> {
        let body = UpdateRoleRequest {
            api_role: api_role.to_string(),
        };
        self.transport
            .put_json(&format!("/v1/users/{}/role", encode_segment(user_id)), &body)
            .await
    }
}

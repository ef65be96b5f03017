use common::api::{Deferral, ResolveDeferralRequest, ResolveDeferralResponse, WaPermission, WaPermissionList};

use super::{Listed, encode_segment};
use crate::error::Result;
use crate::transport::Transport;

pub struct WiseAuthorityResource<'a> {
    transport: &'a Transport,
}

impl<'a> WiseAuthorityResource<'a> {
    pub(crate) fn new(transport: &'a Transport) -> Self {
        Self { transport }
    }

    pub async fn deferrals(&self) -> Result<Vec<Deferral>> {
        let listed: Listed<Deferral> = self.transport.get("/v1/wa/deferrals").await?;
        Ok(listed.into_items())
    }

    pub async fn resolve_deferral(
        &self,
        deferral_id: &str,
        request: &ResolveDeferralRequest,
    ) -> Result<ResolveDeferralResponse> {
        self.transport
            .post_json(
                &format!("/v1/wa/deferrals/{}/resolve", encode_segment(deferral_id)),
                request,
            )
            .await
    }

    pub async fn permissions(&self) -> Result<Vec<WaPermission>> {
        let list: WaPermissionList = self.transport.get("/v1/wa/permissions").await?;
        Ok(list.permissions)
    }
}

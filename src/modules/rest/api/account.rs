// Copyright © 2025 mailblast.dev
// Licensed under MailBlast License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use poem::web::Path;
use poem_openapi::payload::Json;
use poem_openapi::OpenApi;

use crate::modules::account::entity::{ProviderConfig, SendingAccount};
use crate::modules::account::payload::AccountCreateRequest;
use crate::modules::error::code::ErrorCode;
use crate::modules::provider::smtp::{self, SmtpProbeReport};
use crate::modules::rest::api::ApiTags;
use crate::modules::rest::ApiResult;
use crate::raise_error;

pub struct AccountApi;

#[OpenApi(prefix_path = "/api/v1", tag = "ApiTags::Account")]
impl AccountApi {
    /// Registers a new sending account. Provider configuration is validated
    /// here so a broken endpoint or empty host fails at creation, not at the
    /// first send.
    #[oai(path = "/accounts", method = "post", operation_id = "create_account")]
    async fn create_account(
        &self,
        /// The account creation request payload.
        request: Json<AccountCreateRequest>,
    ) -> ApiResult<Json<SendingAccount>> {
        let account = SendingAccount::new(request.0)?;
        Ok(Json(account.save()?))
    }

    /// Retrieves a sending account by its identifier.
    #[oai(path = "/accounts/:id", method = "get", operation_id = "get_account")]
    async fn get_account(
        &self,
        /// The unique identifier of the account.
        id: Path<u64>,
    ) -> ApiResult<Json<SendingAccount>> {
        Ok(Json(SendingAccount::get(id.0)?))
    }

    /// Lists all registered sending accounts, oldest first.
    #[oai(path = "/accounts", method = "get", operation_id = "list_accounts")]
    async fn list_accounts(&self) -> ApiResult<Json<Vec<SendingAccount>>> {
        Ok(Json(SendingAccount::list_all()))
    }

    /// Runs the SMTP handshake (greeting, EHLO, STARTTLS, AUTH) without
    /// sending any mail and returns the dialog transcript. Webhook and
    /// MTA-API accounts have no equivalent handshake and are rejected.
    #[oai(
        path = "/accounts/:id/test-connection",
        method = "post",
        operation_id = "test_account_connection"
    )]
    async fn test_connection(
        &self,
        /// The unique identifier of the account to probe.
        id: Path<u64>,
    ) -> ApiResult<Json<SmtpProbeReport>> {
        let account = SendingAccount::get(id.0)?;
        match &account.provider {
            ProviderConfig::Smtp(config) => Ok(Json(smtp::probe(config).await)),
            _ => Err(raise_error!(
                "Connection testing is only available for SMTP accounts.".into(),
                ErrorCode::InvalidParameter
            )
            .into()),
        }
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Allow-list of provider methods the HTTP proxy may forward.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Provider methods reachable through `POST /`.
///
/// Anything not listed here is rejected before it reaches the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyMethod {
    OAuth,
    CreateSubOrganization,
    EmailAuth,
    InitUserEmailRecovery,
    InitImportWallet,
    InitImportPrivateKey,
    GetSubOrgIds,
}

/// How a method reaches the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Activity submission; the result is read from `activity.result[result_key]`.
    Submit {
        path: &'static str,
        activity_type: &'static str,
        result_key: &'static str,
    },
    /// Read-only query; the response body is returned as-is.
    Query { path: &'static str },
}

impl ProxyMethod {
    pub const ALL: [ProxyMethod; 7] = [
        ProxyMethod::OAuth,
        ProxyMethod::CreateSubOrganization,
        ProxyMethod::EmailAuth,
        ProxyMethod::InitUserEmailRecovery,
        ProxyMethod::InitImportWallet,
        ProxyMethod::InitImportPrivateKey,
        ProxyMethod::GetSubOrgIds,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyMethod::OAuth => "oauth",
            ProxyMethod::CreateSubOrganization => "createSubOrganization",
            ProxyMethod::EmailAuth => "emailAuth",
            ProxyMethod::InitUserEmailRecovery => "initUserEmailRecovery",
            ProxyMethod::InitImportWallet => "initImportWallet",
            ProxyMethod::InitImportPrivateKey => "initImportPrivateKey",
            ProxyMethod::GetSubOrgIds => "getSubOrgIds",
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        match self {
            ProxyMethod::OAuth => Endpoint::Submit {
                path: "/public/v1/submit/oauth",
                activity_type: "ACTIVITY_TYPE_OAUTH",
                result_key: "oauthResult",
            },
            ProxyMethod::CreateSubOrganization => Endpoint::Submit {
                path: "/public/v1/submit/create_sub_organization",
                activity_type: "ACTIVITY_TYPE_CREATE_SUB_ORGANIZATION_V7",
                result_key: "createSubOrganizationResultV7",
            },
            ProxyMethod::EmailAuth => Endpoint::Submit {
                path: "/public/v1/submit/email_auth",
                activity_type: "ACTIVITY_TYPE_EMAIL_AUTH_V2",
                result_key: "emailAuthResult",
            },
            ProxyMethod::InitUserEmailRecovery => Endpoint::Submit {
                path: "/public/v1/submit/init_user_email_recovery",
                activity_type: "ACTIVITY_TYPE_INIT_USER_EMAIL_RECOVERY",
                result_key: "initUserEmailRecoveryResult",
            },
            ProxyMethod::InitImportWallet => Endpoint::Submit {
                path: "/public/v1/submit/init_import_wallet",
                activity_type: "ACTIVITY_TYPE_INIT_IMPORT_WALLET",
                result_key: "initImportWalletResult",
            },
            ProxyMethod::InitImportPrivateKey => Endpoint::Submit {
                path: "/public/v1/submit/init_import_private_key",
                activity_type: "ACTIVITY_TYPE_INIT_IMPORT_PRIVATE_KEY",
                result_key: "initImportPrivateKeyResult",
            },
            ProxyMethod::GetSubOrgIds => Endpoint::Query {
                path: "/public/v1/query/list_suborgs",
            },
        }
    }
}

impl fmt::Display for ProxyMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("method `{0}` is not allowed")]
pub struct MethodNotAllowed(pub String);

impl FromStr for ProxyMethod {
    type Err = MethodNotAllowed;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProxyMethod::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| MethodNotAllowed(s.to_string()))
    }
}

/// Body of a proxied call: `{"methodName": "...", "params": [ {...} ]}`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRequest {
    /// One of the allow-listed provider method names.
    pub method_name: String,
    /// Positional arguments; the first one is the request object.
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub params: Vec<Value>,
}

impl ProxyRequest {
    pub fn request_object(&self) -> Value {
        match self.params.first() {
            Some(Value::Object(map)) => Value::Object(map.clone()),
            _ => Value::Object(Default::default()),
        }
    }
}

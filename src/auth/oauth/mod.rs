//! OAuth2 登录模块
//!
//! 客户端注册、已授权客户端存储以及授权码登录流程

mod authorized_client;
mod error;
mod login;
mod registration;

pub use authorized_client::{
    AccessToken, AuthorizedClient, AuthorizedClientService, InMemoryAuthorizedClientService,
};
pub use error::{ClientResolutionError, LoginError};
pub use login::{AuthorizationRedirect, CallbackParams, LoginOutcome, OAuth2LoginFlow};
pub use registration::{ClientRegistration, ClientRegistrations, ProviderDetails, UserInfoEndpoint};

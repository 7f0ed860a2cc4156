// Wire types for the account endpoints. The backend speaks camelCase.

pub mod requests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    pub struct LoginRequest {
        pub mobile: String,
        pub stick_id: String,
        pub password: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    pub struct RegisterRequest {
        pub name: String,
        pub mobile: String,
        pub email: String,
        pub stick_id: String,
        pub emergency_contacts: Vec<String>,
        pub password: String,
    }
}

pub mod responses {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    pub struct UserDetails {
        pub name: String,
        pub stick_id: String,
        #[serde(default)]
        pub profile_image: Option<String>,
        #[serde(default)]
        pub status: Option<String>,
    }

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    pub struct UserEmail {
        pub email: String,
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
    pub struct ApiMessage {
        #[serde(default)]
        pub message: Option<String>,
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
    pub struct ApiErrorBody {
        #[serde(default)]
        pub error: Option<String>,
    }
}

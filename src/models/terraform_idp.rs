//! Terraform CLI IdP entity models.
//!
//! Three short-lived tables backing `terraform login`: single-use
//! authorization codes, hashed access tokens, and the (subject, issuer)
//! binding that keeps repeated logins stable for one user.

pub mod authorization_code {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "idp_authorization_codes")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
        pub code: String,

        /// PKCE S256 challenge supplied on the authorization request.
        pub code_challenge: String,

        pub redirect_uri: String,

        /// The authenticated user this code was issued for.
        pub subject: String,

        /// Codes are single-use; exchange marks them consumed atomically.
        pub consumed: bool,

        pub expires_at: chrono::DateTime<chrono::Utc>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod access_token {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "idp_access_tokens")]
    pub struct Model {
        /// SHA-256 hash of the opaque token; the raw value is never stored.
        #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
        pub token_hash: String,

        pub subject: String,

        pub expires_at: chrono::DateTime<chrono::Utc>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod subject {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "idp_subjects")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,

        pub subject: String,

        pub issuer: String,

        /// Internal user name the (subject, issuer) pair maps to.
        pub username: String,

        pub created_at: chrono::DateTime<chrono::Utc>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

//! Area and position selection
//!
//! Choosing an area decides which position catalogue the form shows and,
//! for the commercial area, which extra fields apply. There is exactly one
//! resolution path: [`AreaSelection::resolve`].

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::{Position, VerificationClient};
use crate::config::AltaConfig;
use crate::error::{TransportError, ValidationError};

/// Which area ids and position ids follow the commercial flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AreaRules {
    pub commercial_area_id: u32,
    pub advisor_position_id: u32,
}

impl AreaRules {
    pub fn from_config(config: &AltaConfig) -> Self {
        Self {
            commercial_area_id: config.commercial_area_id,
            advisor_position_id: config.advisor_position_id,
        }
    }
}

impl Default for AreaRules {
    fn default() -> Self {
        Self::from_config(&AltaConfig::default())
    }
}

/// Field set a position uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionFlow {
    /// Fixed salary, no commercial fields
    Standard,
    /// Commercial area: salary plus commissions, bank and account
    Commercial,
    /// Commercial advisor: commissions and role, no salary
    Advisor,
}

/// The position the user picked, with the flow it implies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionRole {
    pub area_id: u32,
    pub position_id: u32,
    pub flow: PositionFlow,
}

impl PositionRole {
    pub fn is_commercial(&self) -> bool {
        matches!(self.flow, PositionFlow::Commercial | PositionFlow::Advisor)
    }

    pub fn salary_required(&self) -> bool {
        self.flow != PositionFlow::Advisor
    }

    /// Extra fields shown for this position
    pub fn extra_fields(&self) -> &'static [&'static str] {
        match self.flow {
            PositionFlow::Standard => &[],
            PositionFlow::Commercial => &["numero_comisiones", "banco_string", "numero_cuenta"],
            PositionFlow::Advisor => &[
                "rol_comercial",
                "numero_comisiones",
                "banco_string",
                "numero_cuenta",
            ],
        }
    }
}

/// A resolved area with its position catalogue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AreaSelection {
    pub area_id: u32,
    pub commercial: bool,
    pub positions: Vec<Position>,
    rules: AreaRules,
}

impl AreaSelection {
    /// Load the position catalogue for `area_id`
    pub async fn resolve<C>(
        area_id: u32,
        rules: AreaRules,
        client: &C,
    ) -> Result<Self, TransportError>
    where
        C: VerificationClient + ?Sized,
    {
        let commercial = area_id == rules.commercial_area_id;
        let positions = client.list_positions(area_id).await?;
        debug!(area_id, commercial, positions = positions.len(), "Area resolved");

        Ok(Self {
            area_id,
            commercial,
            positions,
            rules,
        })
    }

    /// Pick a position of this area's catalogue
    pub fn select_position(&self, position_id: u32) -> Result<PositionRole, ValidationError> {
        if !self.positions.iter().any(|p| p.id == position_id) {
            return Err(ValidationError::UnknownPosition {
                area_id: self.area_id,
                position_id,
            });
        }

        let flow = if !self.commercial {
            PositionFlow::Standard
        } else if position_id == self.rules.advisor_position_id {
            PositionFlow::Advisor
        } else {
            PositionFlow::Commercial
        };

        Ok(PositionRole {
            area_id: self.area_id,
            position_id,
            flow,
        })
    }
}

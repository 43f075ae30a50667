// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Core identifier types and the tenant context.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type! {
    /// Unique identifier for a tenant (an isolated customer account).
    TenantId
}

id_type! {
    /// Unique identifier for a rental property.
    PropertyId
}

id_type! {
    /// Unique identifier for a booking.
    BookingId
}

id_type! {
    /// Unique identifier for a financial movement.
    MovementId
}

id_type! {
    /// Unique identifier for an expense line item on a movement.
    ExpenseItemId
}

id_type! {
    /// Unique identifier for a sales channel.
    ChannelId
}

id_type! {
    /// Unique identifier for a configuration catalog row.
    ConfigValueId
}

id_type! {
    /// Unique identifier for a guest record. Opaque to the core.
    PersonId
}

id_type! {
    /// Unique identifier for a service provider. Opaque to the core.
    ServiceProviderId
}

/// Tenant scope for a single core call.
///
/// Every engine operation takes a `TenantContext` so scoping is part of the
/// call signature instead of ambient state; an id resolved under the wrong
/// tenant behaves exactly like a missing id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId) -> Self {
        Self { tenant_id }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_display_as_plain_numbers() {
        assert_eq!(TenantId(7).to_string(), "7");
        assert_eq!(BookingId(42).to_string(), "42");
        assert_eq!(MovementId(1).to_string(), "1");
    }

    #[test]
    fn tenant_context_carries_tenant_id() {
        let ctx = TenantContext::new(TenantId(3));
        assert_eq!(ctx.tenant_id(), TenantId(3));
    }
}

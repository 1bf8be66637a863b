// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

pub mod gnmi {
    include!("api/gen/gnmi.rs");
}

pub mod phaldb {
    // The Set/Get message size difference is large enough to trip clippy's
    // enum variant lint on the generated oneofs.
    #![allow(clippy::large_enum_variant)]
    include!("api/gen/phaldb.rs");
}

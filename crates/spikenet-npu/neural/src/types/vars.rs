// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Variable Registry
//!
//! Every piece of per-element state lives in a flat `f32` row whose layout is
//! fixed by one of the enums below. Hot-path code indexes rows with the enum
//! (a compile-time constant offset); tooling goes through the name table,
//! which is built once on first use and never touched by the cycle loop.
//!
//! | Enum | Row owner | Replicated per data lane |
//! |------|-----------|--------------------------|
//! | [`NeuronVar`] | neuron | yes |
//! | [`NeuronAvgVar`] | neuron | no |
//! | [`SynapseVar`] | synapse | no |
//! | [`SynCaVar`] | synapse | yes |
//! | [`PoolVar`] | pool | yes |

use ahash::AHashMap;
use core::fmt;
use std::sync::OnceLock;

/// Typed access into a variable row.
///
/// Implemented for `[f32]` once per registry enum, so a row slice can be read
/// as `row.var(NeuronVar::Vm)` without bounds juggling at the call site.
pub trait VarRow<V> {
    /// Read one variable
    fn var(&self, v: V) -> f32;

    /// Overwrite one variable
    fn set_var(&mut self, v: V, value: f32);

    /// Add to one variable
    fn add_var(&mut self, v: V, delta: f32);
}

macro_rules! var_registry {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $var:ident => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(usize)]
        pub enum $name {
            $( $(#[$vmeta])* $var ),+
        }

        impl $name {
            /// All variables in row order
            pub const ALL: &'static [$name] = &[$( $name::$var ),+];

            /// Row width
            pub const COUNT: usize = Self::ALL.len();

            const NAMES: &'static [&'static str] = &[$( $label ),+];

            /// Offset of this variable within a row
            #[inline(always)]
            pub const fn index(self) -> usize {
                self as usize
            }

            /// Canonical name
            pub fn name(self) -> &'static str {
                Self::NAMES[self as usize]
            }

            /// Variable at a raw row offset, `None` when out of range
            pub fn from_index(index: usize) -> Option<Self> {
                Self::ALL.get(index).copied()
            }

            /// Variable by canonical name (cold path)
            pub fn from_name(name: &str) -> Option<Self> {
                static TABLE: OnceLock<AHashMap<&'static str, $name>> = OnceLock::new();
                TABLE
                    .get_or_init(|| Self::ALL.iter().map(|v| (v.name(), *v)).collect())
                    .get(name)
                    .copied()
            }

            /// Canonical names in row order
            pub fn names() -> &'static [&'static str] {
                Self::NAMES
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }

        impl VarRow<$name> for [f32] {
            #[inline(always)]
            fn var(&self, v: $name) -> f32 {
                self[v as usize]
            }

            #[inline(always)]
            fn set_var(&mut self, v: $name, value: f32) {
                self[v as usize] = value;
            }

            #[inline(always)]
            fn add_var(&mut self, v: $name, delta: f32) {
                self[v as usize] += delta;
            }
        }
    };
}

var_registry! {
    /// Per-neuron, per-lane state
    NeuronVar {
        /// 1 on the cycle the neuron spiked, else 0
        Spike => "Spike",
        /// 1 if the neuron spiked within the refractory window
        Spiked => "Spiked",
        /// Rate-code activation from ISIAvg
        Act => "Act",
        /// Slowly integrated Act, sampled into ActM / ActP
        ActInt => "ActInt",
        ActM => "ActM",
        ActP => "ActP",
        /// External input (clamped layers)
        Ext => "Ext",
        /// Target value (target layers, applied in the plus phase)
        Target => "Target",
        Ge => "Ge",
        Gi => "Gi",
        Gk => "Gk",
        Inet => "Inet",
        Vm => "Vm",
        /// Cycles since last spike; -1 before the first spike
        Isi => "ISI",
        /// Running average ISI; -1 never spiked, -2 one spike seen
        IsiAvg => "ISIAvg",
        CaSpkP => "CaSpkP",
        CaSpkD => "CaSpkD",
        /// Spike-driven Ca used for synapse-level Ca products
        CaSyn => "CaSyn",
        CaSpkM => "CaSpkM",
        /// CaSpkP at the end of the minus phase
        CaSpkPM => "CaSpkPM",
        /// Learning Ca from NMDA and VGCC sources
        CaLrn => "CaLrn",
        NrnCaM => "NrnCaM",
        NrnCaP => "NrnCaP",
        NrnCaD => "NrnCaD",
        CaDiff => "CaDiff",
        /// Receiver-side learning rate modulation
        RlRate => "RLRate",
        GeExt => "GeExt",
        GeRaw => "GeRaw",
        GeSyn => "GeSyn",
        GiRaw => "GiRaw",
        GiSyn => "GiSyn",
        GknaMed => "GknaMed",
        GknaSlow => "GknaSlow",
        GnmdaSyn => "GnmdaSyn",
        Gnmda => "Gnmda",
        NmdaCa => "NmdaCa",
        VgccCa => "VgccCa",
        VgccCaInt => "VgccCaInt",
        SpkSt1 => "SpkSt1",
        SpkSt2 => "SpkSt2",
    }
}

var_registry! {
    /// Per-neuron state shared by all data lanes (homeostatic averages)
    NeuronAvgVar {
        ActAvg => "ActAvg",
        AvgPct => "AvgPct",
        TrgAvg => "TrgAvg",
        DTrgAvg => "DTrgAvg",
        AvgDif => "AvgDif",
    }
}

var_registry! {
    /// Per-synapse weight state shared by all data lanes
    SynapseVar {
        /// Effective weight: SWt * contrast(LWt)
        Wt => "Wt",
        /// Linear learned weight in [0, 1]
        LWt => "LWt",
        /// Structural weight within the configured limits
        SWt => "SWt",
        DWt => "DWt",
        /// DWt accumulated between slow adaptation passes
        DSWt => "DSWt",
    }
}

var_registry! {
    /// Per-synapse, per-lane calcium cascade
    SynCaVar {
        CaM => "CaM",
        CaP => "CaP",
        CaD => "CaD",
        /// Ca counter value at the last update; -1 never updated
        CaUpT => "CaUpT",
    }
}

var_registry! {
    /// Per-pool, per-lane reduction and inhibition state
    PoolVar {
        /// Mean feedforward drive (GeRaw)
        FFs => "FFs",
        /// Mean feedback drive (Spike)
        FBs => "FBs",
        GeExts => "GeExts",
        /// 1 when the pool's neurons are externally clamped
        Clamped => "Clamped",
        FSi => "FSi",
        SSi => "SSi",
        SSf => "SSf",
        FSGi => "FSGi",
        SSGi => "SSGi",
        /// Inhibition consumed by the membrane phase
        Gi => "Gi",
        /// FFFB Gi before between-layer and layer-max adjustments
        GiOrig => "GiOrig",
        /// Layer-level Gi seen by this pool
        LayGi => "LayGi",
        GiBg => "GiBg",
        FFAvg => "FFAvg",
        FFAvgPrv => "FFAvgPrv",
        ActAvg => "ActAvg",
        ActMax => "ActMax",
        CaSpkPAvg => "CaSpkPAvg",
        CaSpkPMax => "CaSpkPMax",
        ActMAvg => "ActMAvg",
        ActPAvg => "ActPAvg",
    }
}

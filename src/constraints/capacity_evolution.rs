//! Evolution of installed capacity over the years, and device power limits of consumer-owned units.
//!
//! Capacity in a year is the surviving base capacity plus every increment still in service, less
//! the part of those increments retired early. Units owned by an aggregated consumer evolve as a
//! type-level stock per consumer, whose capacity is the sum of the capacities of the units.
use super::BuildContext;
use crate::expression::{construction_starts, service_years};
use crate::index::IndexSpace;
use crate::parameters::TechnologyTable;
use crate::solver::{LinExpr, Problem, Sense, Variable};
use crate::variables::{LocalCapacityVariables, UnitCapacityVariables};
use anyhow::Result;
use indexmap::IndexSet;

/// Everything needed to build capacity constraints for one kind of unit
struct UnitFamily<'a> {
    names: &'a IndexSpace<String>,
    type_names: &'a IndexSpace<String>,
    base_cap: &'a [f64],
    type_of: &'a [usize],
    technology: &'a TechnologyTable,
    capacity: &'a UnitCapacityVariables,
    local_capacity: &'a LocalCapacityVariables,
    units_of_consumer: &'a [IndexSet<usize>],
    types_of_consumer: &'a [IndexSet<usize>],
    buses: Vec<IndexSet<usize>>,
    min_device_nom_power: &'a [Option<f64>],
    max_device_nom_power: &'a [Option<f64>],
}

impl<'a> UnitFamily<'a> {
    fn generators(ctx: &BuildContext<'a>) -> Self {
        let params = ctx.parameters;
        Self {
            names: &ctx.indices.generators,
            type_names: &ctx.indices.generator_types,
            base_cap: &params.generators.base_cap,
            type_of: &params.generators.tgen,
            technology: &params.generator_types.technology,
            capacity: &ctx.variables.g_capacity,
            local_capacity: &ctx.variables.tg_capacity,
            units_of_consumer: &ctx.indices.aggr_gen_map,
            types_of_consumer: &ctx.indices.aggr_tgen_map,
            buses: params.generators.buses.clone(),
            min_device_nom_power: &params.generators.min_device_nom_power,
            max_device_nom_power: &params.generators.max_device_nom_power,
        }
    }

    fn storages(ctx: &BuildContext<'a>) -> Self {
        let params = ctx.parameters;
        Self {
            names: &ctx.indices.storages,
            type_names: &ctx.indices.storage_types,
            base_cap: &params.storages.base_cap,
            type_of: &params.storages.tstor,
            technology: &params.storage_types.technology,
            capacity: &ctx.variables.s_capacity,
            local_capacity: &ctx.variables.ts_capacity,
            units_of_consumer: &ctx.indices.aggr_stor_map,
            types_of_consumer: &ctx.indices.aggr_tstor_map,
            buses: params
                .storages
                .bus
                .iter()
                .map(|&bus| IndexSet::from([bus]))
                .collect(),
            min_device_nom_power: &params.storages.min_device_nom_power,
            max_device_nom_power: &params.storages.max_device_nom_power,
        }
    }

    /// The units of one type owned by a consumer
    fn local_units(&self, aggr: usize, unit_type: usize) -> impl Iterator<Item = usize> + '_ {
        self.units_of_consumer[aggr]
            .iter()
            .copied()
            .filter(move |&unit| self.type_of[unit] == unit_type)
    }
}

/// A stock of capacity evolving through increments and early retirements
struct Stock<P, M, B>
where
    P: Fn(usize) -> Option<Variable>,
    M: Fn(usize, usize) -> Option<Variable>,
    B: Fn(usize) -> Option<Variable>,
{
    base_cap: f64,
    life_time: usize,
    build_time: usize,
    /// New capacity whose construction starts in a year
    plus: P,
    /// Capacity started in one year and retired in another
    minus: M,
    /// Base capacity retired in a year
    base_minus: B,
}

impl<P, M, B> Stock<P, M, B>
where
    P: Fn(usize) -> Option<Variable>,
    M: Fn(usize, usize) -> Option<Variable>,
    B: Fn(usize) -> Option<Variable>,
{
    /// Capacity in service in year `y`
    fn capacity(&self, y: usize) -> LinExpr {
        let mut capacity = LinExpr::new();
        if y < self.life_time {
            capacity += self.base_cap;
            for s in 1..=y {
                if let Some(var) = (self.base_minus)(s) {
                    capacity -= var;
                }
            }
        }
        for s in construction_starts(y, self.life_time, self.build_time) {
            if let Some(var) = (self.plus)(s) {
                capacity += var;
            }
            for t in service_years(y, s, self.life_time, self.build_time) {
                if let Some(var) = (self.minus)(s, t) {
                    capacity -= var;
                }
            }
        }

        capacity
    }

    /// Capacity started in year `y` which is retired before it comes into service
    fn retired_on_completion(&self, y: usize) -> LinExpr {
        service_years(y, y, self.life_time, self.build_time)
            .filter_map(|t| (self.minus)(y, t))
            .map(LinExpr::from)
            .sum()
    }

    /// All capacity started in year `y` and retired at some point
    fn retired(&self, y: usize, n_years: usize) -> LinExpr {
        (0..n_years)
            .filter_map(|t| (self.minus)(y, t))
            .map(LinExpr::from)
            .sum()
    }

    /// Add the evolution rows of the stock, named with the given prefix
    fn add_rows<C>(&self, problem: &mut Problem, prefix: &str, n_years: usize, cap: C) -> Result<()>
    where
        C: Fn(usize) -> Option<Variable>,
    {
        for y in 0..n_years {
            let Some(cap) = cap(y) else {
                continue;
            };
            problem.add_constraint(
                format!("{prefix}CAPACITY_EVOLUTION_CONSTRAINT[{y}]"),
                cap.into(),
                Sense::Eq,
                self.capacity(y),
            )?;

            let retired_on_completion = self.retired_on_completion(y);
            if !retired_on_completion.has_no_terms() {
                problem.add_constraint(
                    format!("{prefix}ZERO_REDUCED_CAPACITY_CONSTRAINT[{y}]"),
                    retired_on_completion,
                    Sense::Eq,
                    0.0.into(),
                )?;
            }
            if let Some(plus) = (self.plus)(y) {
                problem.add_constraint(
                    format!("{prefix}REDUCED_CAPACITY_UB_CONSTRAINT[{y}]"),
                    self.retired(y, n_years),
                    Sense::Le,
                    plus.into(),
                )?;
            }
        }

        Ok(())
    }
}

pub fn build(ctx: &BuildContext, problem: &mut Problem) -> Result<()> {
    for family in [UnitFamily::generators(ctx), UnitFamily::storages(ctx)] {
        base_capacity(problem, &family)?;
        unit_evolution(ctx, problem, &family)?;
        local_evolution(ctx, problem, &family)?;
        device_power(ctx, problem, &family)?;
    }

    Ok(())
}

/// Every unit starts with its base capacity
fn base_capacity(problem: &mut Problem, family: &UnitFamily) -> Result<()> {
    for (unit, name) in family.names.iter() {
        problem.add_constraint(
            format!("{name}_BASE_CAPACITY_CONSTRAINT"),
            family.capacity.cap.at(&[unit, 0]).into(),
            Sense::Eq,
            family.base_cap[unit].into(),
        )?;
    }

    Ok(())
}

/// Capacity evolution of units which are not owned by an aggregated consumer
fn unit_evolution(ctx: &BuildContext, problem: &mut Problem, family: &UnitFamily) -> Result<()> {
    let vars = family.capacity;
    for (unit, name) in family.names.iter() {
        if vars.cap_plus.get(&(unit, 0)).is_none() {
            // Owned by a consumer
            continue;
        }

        let unit_type = family.type_of[unit];
        let stock = Stock {
            base_cap: family.base_cap[unit],
            life_time: family.technology.lt[unit_type],
            build_time: family.technology.bt[unit_type],
            plus: |s: usize| vars.cap_plus.get(&(unit, s)),
            minus: |s: usize, t: usize| vars.cap_minus.get(&(unit, s, t)),
            base_minus: |s: usize| vars.cap_base_minus.get(&(unit, s)),
        };
        stock.add_rows(problem, &format!("{name}_"), ctx.indices.years.len(), |y| {
            Some(vars.cap.at(&[unit, y]))
        })?;
    }

    Ok(())
}

/// Capacity evolution of the units of each type owned by each aggregated consumer
fn local_evolution(ctx: &BuildContext, problem: &mut Problem, family: &UnitFamily) -> Result<()> {
    let vars = family.local_capacity;
    let n_years = ctx.indices.years.len();

    for (aggr, types) in family.types_of_consumer.iter().enumerate() {
        let consumer = ctx.indices.aggregated_consumers.get(aggr);
        for &unit_type in types {
            let prefix = format!("{consumer}_{}_LOCAL_", family.type_names.get(unit_type));
            let stock = Stock {
                base_cap: family
                    .local_units(aggr, unit_type)
                    .map(|unit| family.base_cap[unit])
                    .sum(),
                life_time: family.technology.lt[unit_type],
                build_time: family.technology.bt[unit_type],
                plus: |s: usize| vars.tcap_plus.get(&(aggr, unit_type, s)),
                minus: |s: usize, t: usize| vars.tcap_minus.get(&(aggr, unit_type, s, t)),
                base_minus: |s: usize| vars.tcap_base_minus.get(&(aggr, unit_type, s)),
            };
            stock.add_rows(problem, &prefix, n_years, |y| {
                vars.tcap.get(&(aggr, unit_type, y))
            })?;

            for y in 0..n_years {
                let Some(tcap) = vars.tcap.get(&(aggr, unit_type, y)) else {
                    continue;
                };
                let unit_capacity: LinExpr = family
                    .local_units(aggr, unit_type)
                    .map(|unit| family.capacity.cap.at(&[unit, y]))
                    .sum();
                problem.add_constraint(
                    format!("{prefix}CAPACITY_SUM_CONSTRAINT[{y}]"),
                    tcap.into(),
                    Sense::Eq,
                    unit_capacity,
                )?;
            }
        }
    }

    Ok(())
}

/// Bound the capacity of units attached to a consumer's stack by the number of consumers using
/// the stack times the nominal power of a single device
fn device_power(ctx: &BuildContext, problem: &mut Problem, family: &UnitFamily) -> Result<()> {
    let params = ctx.parameters;
    let indices = ctx.indices;

    for (unit, name) in family.names.iter() {
        let min_power = family.min_device_nom_power[unit];
        let max_power = family.max_device_nom_power[unit];
        if min_power.is_none() && max_power.is_none() {
            continue;
        }

        for lbs in indices.stacks.ord() {
            let Some(aggr) = params.stacks.aggr_idx[lbs] else {
                continue;
            };
            let attached = params.stacks.buses[lbs]
                .values()
                .flatten()
                .any(|bus| family.buses[unit].contains(bus));
            if !attached {
                continue;
            }

            let consumer = indices.aggregated_consumers.get(aggr);
            for y in 1..indices.years.len() {
                let n_consumers = params.aggregated_consumers.n_consumers[aggr][y];
                let fraction = ctx.variables.f_fraction.at(&[aggr, lbs, y]);
                let capacity = family.capacity.cap.at(&[unit, y]);
                if let Some(power) = min_power {
                    problem.add_constraint(
                        format!("{consumer}_{name}_DEVICE_MIN_POWER_CONSTRAINT[{y}]"),
                        fraction * (n_consumers * power),
                        Sense::Le,
                        capacity.into(),
                    )?;
                }
                if let Some(power) = max_power {
                    problem.add_constraint(
                        format!("{consumer}_{name}_DEVICE_MAX_POWER_CONSTRAINT[{y}]"),
                        fraction * (n_consumers * power),
                        Sense::Ge,
                        capacity.into(),
                    )?;
                }
            }
        }
    }

    Ok(())
}

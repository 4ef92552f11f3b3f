//! Exemplar clauses per clause type.
//!
//! Each type's centroid is the normalised mean of its exemplars' embeddings.
//! `Other` carries the boilerplate a contract is mostly made of, so that
//! payment, notice and counterpart clauses do not get pulled toward a
//! regulated category.

use lawvisor_core::ClauseType;

pub fn exemplars(clause_type: ClauseType) -> &'static [&'static str] {
    match clause_type {
        ClauseType::DataProtection => &[
            "The processor shall process personal data only on documented instructions from the controller.",
            "The supplier shall implement appropriate technical and organisational security measures, including encryption and pseudonymisation of personal data.",
            "The provider shall notify the customer of any personal data breach without undue delay.",
            "Customer data and personal information of data subjects shall be kept confidential and processed in accordance with applicable data protection law, including the GDPR.",
            "The processor shall not engage a sub-processor without the prior written authorisation of the controller.",
            "Personal data collected under this agreement shall be retained only as long as necessary for the purposes of processing, and the data subject may withdraw consent at any time.",
            "The company may collect, use, share and sell user data and personal information for marketing and analytics purposes.",
        ],
        ClauseType::Liability => &[
            "Neither party shall be liable for any indirect, incidental, special or consequential damages, including loss of profits.",
            "The total aggregate liability of the supplier under this agreement shall not exceed the fees paid in the twelve months preceding the claim.",
            "The customer shall indemnify and hold harmless the provider against all claims, losses, damages and expenses.",
            "The supplier disclaims all warranties, express or implied, and accepts no liability for any errors or omissions.",
            "Nothing in this agreement limits liability for fraud, fraudulent misrepresentation, death or personal injury caused by negligence.",
        ],
        ClauseType::Termination => &[
            "Either party may terminate this agreement for convenience upon thirty days written notice.",
            "The provider may terminate or suspend the services immediately, without notice, for any reason.",
            "Upon termination or expiry of this agreement, the supplier shall return or delete all customer data.",
            "This agreement shall automatically renew for successive one-year terms unless terminated by written notice of non-renewal.",
            "Either party may terminate this agreement if the other party commits a material breach that remains uncured after notice.",
        ],
        ClauseType::IntellectualProperty => &[
            "All intellectual property rights, including copyright, patents, trademarks and trade secrets, in the deliverables shall vest in the customer.",
            "The supplier grants the customer a non-exclusive, non-transferable licence to use the software during the term.",
            "The contractor hereby assigns to the company all right, title and interest in any inventions and work product created under this agreement.",
            "Each party retains ownership of its pre-existing intellectual property and background technology.",
            "The customer grants the provider a perpetual, irrevocable, worldwide, royalty-free licence to use customer content and feedback.",
        ],
        ClauseType::Jurisdiction => &[
            "This agreement shall be governed by and construed in accordance with the laws of the State of New York.",
            "The parties submit to the exclusive jurisdiction of the courts of England and Wales for any dispute arising from this agreement.",
            "Any dispute shall be finally resolved by binding arbitration seated in Singapore, and the venue shall be Singapore.",
            "Data may be transferred to and stored on servers located in any country outside the European Economic Area.",
            "Cross-border transfers of customer data to third countries shall be made under standard contractual clauses.",
        ],
        ClauseType::Other => &[
            "The customer shall pay all invoices within thirty days of the invoice date; late payments accrue interest.",
            "All notices under this agreement shall be in writing and delivered by hand, courier or email to the addresses set out above.",
            "This agreement may be executed in any number of counterparts, each of which is an original.",
            "This agreement constitutes the entire agreement between the parties and supersedes all prior negotiations and understandings.",
            "If any provision of this agreement is held invalid, the remaining provisions shall continue in full force and effect.",
            "No amendment or variation of this agreement is effective unless in writing and signed by both parties.",
            "Neither party shall be in breach for delay caused by events beyond its reasonable control, including fire, flood or war.",
            "In this agreement, capitalised terms have the meanings given in this clause; headings are for convenience only.",
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_type_has_exemplars() {
        for ty in ClauseType::ALL {
            assert!(exemplars(ty).len() >= 5, "{ty} needs at least five exemplars");
        }
    }

    #[test]
    fn exemplars_are_distinct() {
        let mut all: Vec<&str> = ClauseType::ALL.iter().flat_map(|t| exemplars(*t).iter().copied()).collect();
        let total = all.len();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), total);
    }
}

//! Resource type configurations for tagging through Cloud Control
//!
//! This module defines:
//! - Resource addresses (`TYPE|IDENTIFIER`)
//! - The CloudFormation resource types whose `Tags` property can be managed

use std::fmt;
use std::str::FromStr;

use tagsync_core::ReservedKeys;
use thiserror::Error;

/// Errors from parsing or resolving a resource address
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("Invalid resource address '{0}', expected TYPE|IDENTIFIER (e.g. AWS::EC2::VPC|vpc-0abc)")]
    Malformed(String),

    #[error("Resource type {0} does not support tags")]
    NotTaggable(String),
}

/// A Cloud Control resource: CloudFormation type name plus primary identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceAddress {
    /// CloudFormation type name (e.g., "AWS::EC2::VPC")
    pub type_name: String,
    /// Primary identifier (e.g., "vpc-0abc")
    pub identifier: String,
}

impl ResourceAddress {
    pub fn new(type_name: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            identifier: identifier.into(),
        }
    }

    /// Tagging configuration for this resource type
    pub fn taggable(&self) -> Result<&'static TaggableResource, AddressError> {
        taggable_resource(&self.type_name)
            .ok_or_else(|| AddressError::NotTaggable(self.type_name.clone()))
    }
}

impl FromStr for ResourceAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || AddressError::Malformed(s.to_string());

        let (type_name, identifier) = s.split_once('|').ok_or_else(malformed)?;
        let segments: Vec<&str> = type_name.split("::").collect();
        if segments.len() != 3 || segments.iter().any(|p| p.is_empty()) || identifier.is_empty()
        {
            return Err(malformed());
        }

        Ok(Self::new(type_name, identifier))
    }
}

impl fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.type_name, self.identifier)
    }
}

/// Reserved-key rules a service applies to its resources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservedPreset {
    Aws,
    ElasticBeanstalk,
    Rds,
}

impl ReservedPreset {
    pub fn reserved_keys(self) -> ReservedKeys {
        match self {
            ReservedPreset::Aws => ReservedKeys::aws(),
            ReservedPreset::ElasticBeanstalk => ReservedKeys::elasticbeanstalk(),
            ReservedPreset::Rds => ReservedKeys::rds(),
        }
    }
}

/// Tagging configuration for a resource type
#[derive(Debug)]
pub struct TaggableResource {
    /// AWS CloudFormation type name (e.g., "AWS::EC2::VPC")
    pub aws_type_name: &'static str,
    /// Reserved keys for this service
    pub reserved: ReservedPreset,
}

macro_rules! taggable {
    ($type_name:expr) => {
        taggable!($type_name, ReservedPreset::Aws)
    };
    ($type_name:expr, $reserved:expr) => {
        TaggableResource {
            aws_type_name: $type_name,
            reserved: $reserved,
        }
    };
}

/// Resource types whose `Tags` property is a `[{Key, Value}]` list
pub const TAGGABLE_RESOURCES: &[TaggableResource] = &[
    // EC2 / VPC
    taggable!("AWS::EC2::VPC"),
    taggable!("AWS::EC2::Subnet"),
    taggable!("AWS::EC2::InternetGateway"),
    taggable!("AWS::EC2::RouteTable"),
    taggable!("AWS::EC2::EIP"),
    taggable!("AWS::EC2::NatGateway"),
    taggable!("AWS::EC2::SecurityGroup"),
    // Storage
    taggable!("AWS::S3::Bucket"),
    taggable!("AWS::DynamoDB::Table"),
    taggable!("AWS::ECR::Repository"),
    // Databases
    taggable!("AWS::RDS::DBInstance", ReservedPreset::Rds),
    taggable!("AWS::RDS::DBCluster", ReservedPreset::Rds),
    taggable!("AWS::RDS::DBParameterGroup", ReservedPreset::Rds),
    // Application platforms
    taggable!(
        "AWS::ElasticBeanstalk::Environment",
        ReservedPreset::ElasticBeanstalk
    ),
    taggable!("AWS::Lambda::Function"),
    // Messaging
    taggable!("AWS::SQS::Queue"),
    taggable!("AWS::SNS::Topic"),
    // Security and observability
    taggable!("AWS::IAM::Role"),
    taggable!("AWS::KMS::Key"),
    taggable!("AWS::Logs::LogGroup"),
];

/// Look up the tagging configuration for a CloudFormation type name
pub fn taggable_resource(type_name: &str) -> Option<&'static TaggableResource> {
    TAGGABLE_RESOURCES
        .iter()
        .find(|r| r.aws_type_name == type_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_resource_address() {
        let addr: ResourceAddress = "AWS::EC2::VPC|vpc-0abc".parse().unwrap();
        assert_eq!(addr.type_name, "AWS::EC2::VPC");
        assert_eq!(addr.identifier, "vpc-0abc");
        assert_eq!(addr.to_string(), "AWS::EC2::VPC|vpc-0abc");
    }

    #[test]
    fn identifier_may_contain_separators() {
        let addr: ResourceAddress = "AWS::Logs::LogGroup|/aws/lambda/fn|x".parse().unwrap();
        assert_eq!(addr.identifier, "/aws/lambda/fn|x");
    }

    #[test]
    fn reject_malformed_addresses() {
        for input in [
            "vpc-0abc",
            "AWS::EC2::VPC|",
            "AWS::EC2|vpc-0abc",
            "AWS::::VPC|vpc-0abc",
            "|vpc-0abc",
        ] {
            let err = input.parse::<ResourceAddress>().unwrap_err();
            assert_eq!(err, AddressError::Malformed(input.to_string()));
        }
    }

    #[test]
    fn taggable_lookup() {
        let vpc = taggable_resource("AWS::EC2::VPC").unwrap();
        assert_eq!(vpc.reserved, ReservedPreset::Aws);

        let rds = ResourceAddress::new("AWS::RDS::DBInstance", "db-1")
            .taggable()
            .unwrap();
        assert!(rds.reserved.reserved_keys().is_reserved("rds:owner"));

        let err = ResourceAddress::new("AWS::EC2::Route", "r-1")
            .taggable()
            .unwrap_err();
        assert_eq!(err.to_string(), "Resource type AWS::EC2::Route does not support tags");
    }

    #[test]
    fn elastic_beanstalk_reserves_name() {
        let env = taggable_resource("AWS::ElasticBeanstalk::Environment").unwrap();
        assert!(env.reserved.reserved_keys().is_reserved("Name"));
    }
}
